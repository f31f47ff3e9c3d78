//! Persisted settings
//!
//! A [`KeyValueStore`] holds string values grouped by namespace. Each tracker
//! gets its own namespace (see [`tracker_namespace`]); [`BASE_NAMESPACE`] is
//! shared by every tracker of a context.
//!
//! [`Preferences`] is the typed view a tracker works with. Reads and writes
//! never fail from the caller's point of view: store errors are logged and
//! reads fall back to "absent".

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::db::{self, Schema};
use crate::error::Result;

/// Namespace shared by all trackers of a context
pub const BASE_NAMESPACE: &str = "trackline";

/// Namespace for the tracker called `tracker_name`
pub fn tracker_namespace(tracker_name: &str) -> String {
    let digest = Sha256::digest(tracker_name.as_bytes());
    format!("{}.tracker.{}", BASE_NAMESPACE, hex::encode(digest))
}

/// Abstract persisted get/put store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
    fn remove(&self, namespace: &str, key: &str) -> Result<()>;
}

/// Process-local store, for tests and hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open(path, Schema::Store)?),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory(Schema::Store)?),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO preferences (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![namespace, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM preferences WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }
}

/// One namespace of a store, with typed accessors.
///
/// Read-modify-write sequences hold [`Preferences::lock`] so they are atomic
/// with respect to every other user of the same namespace.
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    lock: Mutex<()>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Serialize a read-modify-write sequence
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.store.get(&self.namespace, key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to read preference");
                None
            }
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let raw = self.get_string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring non-numeric preference");
                None
            }
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key).map(|raw| raw == "true")
    }

    pub fn put_string(&self, key: &str, value: &str) {
        if let Err(e) = self.store.put(&self.namespace, key, value) {
            tracing::warn!(error = %e, key, "Failed to write preference");
        }
    }

    pub fn put_i64(&self, key: &str, value: i64) {
        self.put_string(key, &value.to_string());
    }

    pub fn put_bool(&self, key: &str, value: bool) {
        self.put_string(key, if value { "true" } else { "false" });
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(&self.namespace, key) {
            tracing::warn!(error = %e, key, "Failed to remove preference");
        }
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(store: Arc<dyn KeyValueStore>) {
        let prefs = Preferences::new(store.clone(), "ns");
        assert_eq!(prefs.get_string("a"), None);

        prefs.put_string("a", "one");
        prefs.put_i64("n", 42);
        prefs.put_bool("flag", true);
        assert_eq!(prefs.get_string("a").as_deref(), Some("one"));
        assert_eq!(prefs.get_i64("n"), Some(42));
        assert_eq!(prefs.get_bool("flag"), Some(true));

        prefs.put_string("a", "two");
        assert_eq!(prefs.get_string("a").as_deref(), Some("two"));

        prefs.remove("a");
        assert_eq!(prefs.get_string("a"), None);

        // Namespaces do not leak into each other
        let other = Preferences::new(store, "other");
        assert_eq!(other.get_i64("n"), None);
    }

    #[test]
    fn test_memory_store() {
        round_trip(Arc::new(MemoryStore::new()));
    }

    #[test]
    fn test_sqlite_store() {
        round_trip(Arc::new(SqliteStore::open_in_memory().unwrap()));
    }

    #[test]
    fn test_sqlite_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("ns", "visitor", "0123456789abcdef").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("ns", "visitor").unwrap().as_deref(),
            Some("0123456789abcdef")
        );
    }

    #[test]
    fn test_non_numeric_value_reads_as_absent() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()), "ns");
        prefs.put_string("n", "abc");
        assert_eq!(prefs.get_i64("n"), None);
    }

    #[test]
    fn test_tracker_namespace() {
        let ns = tracker_namespace("Default Tracker");
        assert!(ns.starts_with("trackline.tracker."));
        assert_eq!(ns.len(), "trackline.tracker.".len() + 64);
        assert_eq!(ns, tracker_namespace("Default Tracker"));
        assert_ne!(ns, tracker_namespace("Other Tracker"));
    }
}
