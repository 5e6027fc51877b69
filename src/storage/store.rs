//! System-of-record store
//!
//! The relational store is an external collaborator; the core talks to it
//! through the [`Store`] trait with table/key/value semantics and idempotent
//! writes per natural key. The bundled [`SledStore`] keeps the same
//! contract on a local sled database (one tree per table, keys ordered so
//! timestamp-prefixed scans come back chronologically).

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store database error: {0}")]
    Database(String),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store timed out")]
    Timeout,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Typed key/value store with named tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent upsert by natural key.
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// All entries whose key starts with `prefix`, in key order.
    async fn scan_prefix(
        &self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// Sled-backed store. One tree per table.
///
/// Durability note: no per-write flush; sled's background flushing loses at
/// most the last few writes on a crash, which the pipeline re-generates on
/// the next cycle.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// In-memory instance for tests.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn tree(&self, table: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(table)?)
    }
}

#[async_trait]
impl Store for SledStore {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let tree = self.tree(table)?;
        tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let tree = self.tree(table)?;
        Ok(tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn scan_prefix(
        &self,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let tree = self.tree(table)?;
        let mut results = Vec::new();
        for item in tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            results.push((String::from_utf8_lossy(&key).into_owned(), value.to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = SledStore::temporary().expect("open");
        store
            .put("cc_algorithm_state", "T001|coolant_temp", b"{}".to_vec())
            .await
            .expect("put");
        let value = store
            .get("cc_algorithm_state", "T001|coolant_temp")
            .await
            .expect("get");
        assert_eq!(value, Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn put_is_idempotent_per_key() {
        let store = SledStore::temporary().expect("open");
        store
            .put("refuel_events", "T001|2026-08-01T10:00:00Z|refuel", b"a".to_vec())
            .await
            .expect("put");
        store
            .put("refuel_events", "T001|2026-08-01T10:00:00Z|refuel", b"b".to_vec())
            .await
            .expect("put");
        let all = store
            .scan_prefix("refuel_events", "T001|")
            .await
            .expect("scan");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, b"b".to_vec());
    }

    #[tokio::test]
    async fn scan_prefix_returns_in_key_order() {
        let store = SledStore::temporary().expect("open");
        for ts in ["2026-08-01T10:00:15Z", "2026-08-01T10:00:00Z", "2026-08-01T10:00:30Z"] {
            store
                .put("fuel_metrics", &format!("T001|{ts}"), ts.as_bytes().to_vec())
                .await
                .expect("put");
        }
        let all = store.scan_prefix("fuel_metrics", "T001|").await.expect("scan");
        let keys: Vec<&str> = all.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "T001|2026-08-01T10:00:00Z",
                "T001|2026-08-01T10:00:15Z",
                "T001|2026-08-01T10:00:30Z"
            ]
        );
    }

    #[tokio::test]
    async fn tables_are_isolated() {
        let store = SledStore::temporary().expect("open");
        store.put("a", "k", b"1".to_vec()).await.expect("put");
        let other = store.get("b", "k").await.expect("get");
        assert_eq!(other, None);
    }
}
