//! Disk-backed overflow tier of the event cache.
//!
//! Events land here while the dispatcher is offline. Rows are kept in
//! insertion order; age and size ceilings are enforced oldest-first on every
//! maintenance pass (cache, uncache, emptiness check).

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::db::{self, Schema};
use crate::error::Result;

use super::event::Event;

pub struct DiskCache {
    conn: Connection,
    /// >0 limit in ms, 0 unlimited, <0 caching disabled
    max_age_ms: i64,
    /// >0 limit in bytes, 0 unlimited
    max_size: i64,
}

impl DiskCache {
    /// Open or create the cache database at `path`
    pub fn open(path: &Path, max_age_ms: i64, max_size: i64) -> Result<Self> {
        let conn = db::open(path, Schema::Cache)?;
        let mut cache = Self {
            conn,
            max_age_ms,
            max_size,
        };
        let restored = cache.len()?;
        if restored > 0 {
            tracing::debug!(restored, path = %path.display(), "Found cached events on disk");
        }
        cache.enforce_limits()?;
        Ok(cache)
    }

    /// A cache that does not outlive the process
    pub fn in_memory(max_age_ms: i64, max_size: i64) -> Result<Self> {
        Ok(Self {
            conn: db::open_in_memory(Schema::Cache)?,
            max_age_ms,
            max_size,
        })
    }

    pub fn set_limits(&mut self, max_age_ms: i64, max_size: i64) {
        self.max_age_ms = max_age_ms;
        self.max_size = max_size;
    }

    pub fn max_age_ms(&self) -> i64 {
        self.max_age_ms
    }

    pub fn max_size(&self) -> i64 {
        self.max_size
    }

    /// A negative max age disables the disk tier
    pub fn is_enabled(&self) -> bool {
        self.max_age_ms >= 0
    }

    /// Append events in order. Returns how many were written.
    pub fn cache(&mut self, events: &[Event]) -> Result<usize> {
        if !self.is_enabled() || events.is_empty() {
            return Ok(0);
        }

        let cutoff = self.age_cutoff_ms();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO cached_events (timestamp, query, size) VALUES (?1, ?2, ?3)",
            )?;
            for event in events {
                if cutoff.is_some_and(|cutoff| event.timestamp() * 1000 < cutoff) {
                    continue;
                }
                stmt.execute(params![
                    event.timestamp(),
                    event.encoded_query(),
                    event.disk_size()
                ])?;
                written += 1;
            }
        }
        tx.commit()?;

        self.enforce_limits()?;
        tracing::debug!(written, "Cached events to disk");
        Ok(written)
    }

    /// Remove and return every cached event, oldest first
    pub fn uncache(&mut self) -> Result<Vec<Event>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        self.enforce_limits()?;

        let tx = self.conn.transaction()?;
        let events = {
            let mut stmt =
                tx.prepare_cached("SELECT timestamp, query FROM cached_events ORDER BY id")?;
            let rows = stmt.query_map([], |row| Ok(Event::new(row.get(0)?, row.get::<_, String>(1)?)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.execute("DELETE FROM cached_events", [])?;
        tx.commit()?;

        tracing::debug!(count = events.len(), "Uncached events from disk");
        Ok(events)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        self.enforce_limits()?;
        Ok(self.len()? == 0)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cached_events", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// Total bytes of cached records
    pub fn size_bytes(&self) -> Result<i64> {
        let size: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM cached_events",
            [],
            |r| r.get(0),
        )?;
        Ok(size)
    }

    /// Drop everything. Returns how many events were discarded.
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM cached_events", [])?;
        Ok(removed)
    }

    fn age_cutoff_ms(&self) -> Option<i64> {
        (self.max_age_ms > 0).then(|| Utc::now().timestamp_millis() - self.max_age_ms)
    }

    /// Drop expired and over-budget events, oldest first
    fn enforce_limits(&mut self) -> Result<usize> {
        if !self.is_enabled() {
            let removed = self.clear()?;
            if removed > 0 {
                tracing::info!(removed, "Offline cache disabled, dropped cached events");
            }
            return Ok(removed);
        }

        let mut removed = 0;

        if let Some(cutoff) = self.age_cutoff_ms() {
            let expired = self.conn.execute(
                "DELETE FROM cached_events WHERE timestamp * 1000 < ?1",
                [cutoff],
            )?;
            if expired > 0 {
                tracing::info!(expired, max_age_ms = self.max_age_ms, "Dropped expired cached events");
            }
            removed += expired;
        }

        if self.max_size > 0 {
            let mut excess = self.size_bytes()? - self.max_size;
            if excess > 0 {
                let mut last_dropped = None;
                {
                    let mut stmt = self
                        .conn
                        .prepare_cached("SELECT id, size FROM cached_events ORDER BY id")?;
                    let mut rows = stmt.query([])?;
                    while excess > 0 {
                        let Some(row) = rows.next()? else { break };
                        let id: i64 = row.get(0)?;
                        let size: i64 = row.get(1)?;
                        excess -= size;
                        last_dropped = Some(id);
                    }
                }
                if let Some(id) = last_dropped {
                    let evicted = self
                        .conn
                        .execute("DELETE FROM cached_events WHERE id <= ?1", [id])?;
                    tracing::info!(evicted, max_size = self.max_size, "Offline cache over budget, dropped oldest events");
                    removed += evicted;
                }
            }
        }

        Ok(removed)
    }
}
