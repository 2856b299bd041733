use crate::error::StoreError;
use crate::history::{self, HistoryRecord};
use crate::queue::DeliveryQueue;
use crate::seen::SeenSet;
use crate::session::SessionState;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Named records kept in the key-value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecordKey {
    SeenIds,
    Queue,
    SessionSnapshot,
    History,
}

/// Minimal persistence port. Reads are infallible by contract: a store that
/// cannot answer returns `None`.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, used by tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// SQLite-backed store: one `kv` table holding JSON values
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        let result = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional();

        match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, %err, "failed to read record");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Typed accessors over a [`KvStore`], one pair per record kind.
#[derive(Debug)]
pub struct ProgressStore<S: KvStore> {
    kv: S,
}

impl<S: KvStore> ProgressStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    fn read<T: DeserializeOwned>(&self, key: RecordKey) -> Option<T> {
        let raw = self.kv.get(&key.to_string())?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%key, %err, "discarding unreadable record");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: RecordKey, value: &T) -> Result<(), StoreError> {
        let key = key.to_string();
        let encoded = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.kv.set(&key, &encoded)
    }

    fn clear(&self, key: RecordKey) -> Result<(), StoreError> {
        self.kv.remove(&key.to_string())
    }

    pub fn load_seen(&self) -> SeenSet {
        self.read(RecordKey::SeenIds).unwrap_or_default()
    }

    pub fn save_seen(&self, seen: &SeenSet) -> Result<(), StoreError> {
        self.write(RecordKey::SeenIds, seen)
    }

    pub fn clear_seen(&self) -> Result<(), StoreError> {
        self.clear(RecordKey::SeenIds)
    }

    pub fn load_queue(&self) -> DeliveryQueue {
        self.read(RecordKey::Queue).unwrap_or_default()
    }

    pub fn save_queue(&self, queue: &DeliveryQueue) -> Result<(), StoreError> {
        self.write(RecordKey::Queue, queue)
    }

    pub fn clear_queue(&self) -> Result<(), StoreError> {
        self.clear(RecordKey::Queue)
    }

    pub fn load_snapshot(&self) -> Option<SessionState> {
        self.read(RecordKey::SessionSnapshot)
    }

    pub fn save_snapshot(&self, state: &SessionState) -> Result<(), StoreError> {
        self.write(RecordKey::SessionSnapshot, state)
    }

    pub fn clear_snapshot(&self) -> Result<(), StoreError> {
        self.clear(RecordKey::SessionSnapshot)
    }

    pub fn load_history(&self) -> Vec<HistoryRecord> {
        self.read(RecordKey::History).unwrap_or_default()
    }

    /// Prepend `record`, evict past the cap, persist and return the new list.
    pub fn append_history(&self, record: HistoryRecord) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut records = self.load_history();
        history::push_capped(&mut records, record);
        self.write(RecordKey::History, &records)?;
        Ok(records)
    }

    pub fn export_history(&self) -> String {
        history::export_csv(&self.load_history())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_names() {
        assert_eq!(RecordKey::SeenIds.to_string(), "seen_ids");
        assert_eq!(RecordKey::Queue.to_string(), "queue");
        assert_eq!(RecordKey::SessionSnapshot.to_string(), "session_snapshot");
        assert_eq!(RecordKey::History.to_string(), "history");
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_sqlite_store_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("two"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("seen_ids", r#"["a"]"#).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("seen_ids").as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn test_corrupt_records_read_as_defaults() {
        let store = ProgressStore::new(MemoryStore::new());
        for key in [
            RecordKey::SeenIds,
            RecordKey::Queue,
            RecordKey::SessionSnapshot,
            RecordKey::History,
        ] {
            store.kv().set(&key.to_string(), "{not json").unwrap();
        }
        assert!(store.load_seen().is_empty());
        assert!(store.load_queue().is_empty());
        assert!(store.load_snapshot().is_none());
        assert!(store.load_history().is_empty());
    }

    #[test]
    fn test_absent_records_read_as_defaults() {
        let store = ProgressStore::new(MemoryStore::new());
        assert!(store.load_seen().is_empty());
        assert_eq!(store.load_queue(), DeliveryQueue::default());
        assert!(store.load_snapshot().is_none());
        assert!(store.load_history().is_empty());
        assert_eq!(
            store.export_history(),
            "timestamp,attempted,correct,score_pct,duration_sec,total_questions"
        );
    }
}
