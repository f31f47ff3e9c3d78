//! Event cache: an in-memory queue backed by the disk tier.
//!
//! While online, new events go to memory and the dispatcher drains them from
//! there. Going offline moves the memory queue to disk; coming back online
//! moves the disk contents in front of the memory queue (they are older).
//! All entry points lock internally, callers never synchronize.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::disk::DiskCache;
use super::event::Event;

pub struct EventCache {
    inner: Mutex<Inner>,
}

struct Inner {
    queue: VecDeque<Event>,
    disk: DiskCache,
    online: bool,
}

impl Inner {
    /// Move the memory queue to disk. Keeps events in memory if the disk
    /// tier is disabled or failing.
    fn spill_to_disk(&mut self) -> usize {
        if self.queue.is_empty() || !self.disk.is_enabled() {
            return 0;
        }
        let to_cache: Vec<Event> = self.queue.iter().cloned().collect();
        match self.disk.cache(&to_cache) {
            Ok(_) => {
                self.queue.clear();
                to_cache.len()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write events to disk, keeping them in memory");
                0
            }
        }
    }

    fn restore_from_disk(&mut self) -> usize {
        match self.disk.uncache() {
            Ok(restored) => {
                let count = restored.len();
                // Anything on disk is older than what memory holds
                for event in restored.into_iter().rev() {
                    self.queue.push_front(event);
                }
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached events from disk");
                0
            }
        }
    }
}

impl EventCache {
    pub fn new(disk: DiskCache) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                disk,
                online: true,
            }),
        }
    }

    /// Append an event to the tier matching the last known state
    pub fn add(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap();
        if inner.online || !inner.disk.is_enabled() {
            inner.queue.push_back(event);
            return;
        }
        if let Err(e) = inner.disk.cache(std::slice::from_ref(&event)) {
            tracing::warn!(error = %e, "Failed to cache event on disk, keeping it in memory");
            inner.queue.push_back(event);
        }
    }

    /// Switch tiers for the given connectivity.
    ///
    /// Returns true if there is something to drain right now.
    pub fn update_state(&self, online: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.online = online;
        if online {
            let restored = inner.restore_from_disk();
            if restored > 0 {
                tracing::debug!(restored, "Switched state to ONLINE, uncached events from disk");
            }
        } else {
            let cached = inner.spill_to_disk();
            if cached > 0 {
                tracing::debug!(cached, "Switched state to OFFLINE, cached events to disk");
            }
        }
        online && !inner.queue.is_empty()
    }

    /// Move up to `limit` events, oldest first, into `target`.
    /// Returns how many were moved.
    pub fn drain_to(&self, target: &mut Vec<Event>, limit: usize) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let count = limit.min(inner.queue.len());
        target.extend(inner.queue.drain(..count));
        count
    }

    /// Put drained-but-unsent events back at the front, keeping their order
    pub fn requeue(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        for event in events.into_iter().rev() {
            inner.queue.push_front(event);
        }
    }

    /// Discard everything, memory and disk
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        let in_memory = inner.queue.len();
        inner.queue.clear();
        let on_disk = inner.disk.clear().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to clear disk cache");
            0
        });
        tracing::debug!(in_memory, on_disk, "Cleared event cache");
    }

    pub fn is_empty(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.queue.is_empty() {
            return false;
        }
        inner.disk.is_empty().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to inspect disk cache");
            true
        })
    }

    /// Events waiting in memory
    pub fn memory_len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Events waiting on disk
    pub fn disk_len(&self) -> usize {
        self.inner.lock().unwrap().disk.len().unwrap_or(0)
    }

    /// Bytes used by the disk tier
    pub fn disk_size_bytes(&self) -> i64 {
        self.inner.lock().unwrap().disk.size_bytes().unwrap_or(0)
    }

    /// Update the disk tier's ceilings; applied on its next maintenance pass
    pub fn set_limits(&self, max_age_ms: i64, max_size: i64) {
        self.inner.lock().unwrap().disk.set_limits(max_age_ms, max_size);
    }
}
