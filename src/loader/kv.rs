//! Key-value store rule sources
//!
//! Two collection shapes are supported:
//!
//! - **Set**: every member of the collection is one rule line
//! - **Hash**: every entry is flattened to a `"field value"` line
//!
//! The store client itself sits behind the [`KvStore`] trait so the loaders
//! stay independent of any particular client library. A Redis client is
//! provided behind the `redis` feature.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};

use super::RuleLoader;
use crate::error::LoaderError;

/// Default collection key
pub const DEFAULT_KV_KEY: &str = "policy";

/// Minimal key-value store client
///
/// All implementations must be `Send + Sync`; one client may be shared by
/// several loaders of the same engine.
#[async_trait]
pub trait KvStore: Send + Sync + Debug {
    /// Read all members of a set-like collection
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Store` if the round trip fails.
    async fn members(&self, key: &str) -> Result<Vec<String>, LoaderError>;

    /// Read all entries of a map-like collection
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Store` if the round trip fails.
    async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, LoaderError>;

    /// Close the connection
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Store` if the connection cannot be closed cleanly.
    async fn close(&self) -> Result<(), LoaderError>;
}

fn normalize_key(key: Option<String>) -> String {
    key.filter(|k| !k.is_empty())
        .unwrap_or_else(|| DEFAULT_KV_KEY.to_string())
}

/// Loads rules from the members of a set
#[derive(Debug, Clone)]
pub struct KvSetLoader {
    store: Arc<dyn KvStore>,
    key: String,
}

impl KvSetLoader {
    /// Create a loader reading `key` (or [`DEFAULT_KV_KEY`] when `None`/empty)
    pub fn new(store: Arc<dyn KvStore>, key: Option<String>) -> Self {
        Self {
            store,
            key: normalize_key(key),
        }
    }

    /// Collection key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl RuleLoader for KvSetLoader {
    fn name(&self) -> String {
        format!("kv-set:{}", self.key)
    }

    async fn load(&self) -> Result<Bytes, LoaderError> {
        let members = self.store.members(&self.key).await?;
        Ok(Bytes::from(members.join("\n")))
    }

    async fn close(&self) -> Result<(), LoaderError> {
        self.store.close().await
    }
}

/// Loads rules from the entries of a hash, one `"field value"` line each
#[derive(Debug, Clone)]
pub struct KvHashLoader {
    store: Arc<dyn KvStore>,
    key: String,
}

impl KvHashLoader {
    /// Create a loader reading `key` (or [`DEFAULT_KV_KEY`] when `None`/empty)
    pub fn new(store: Arc<dyn KvStore>, key: Option<String>) -> Self {
        Self {
            store,
            key: normalize_key(key),
        }
    }

    /// Collection key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl RuleLoader for KvHashLoader {
    fn name(&self) -> String {
        format!("kv-hash:{}", self.key)
    }

    async fn load(&self) -> Result<Bytes, LoaderError> {
        let entries = self.store.entries(&self.key).await?;
        let mut buf = BytesMut::new();
        for (field, value) in entries {
            buf.put_slice(field.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(value.as_bytes());
            buf.put_u8(b'\n');
        }
        Ok(buf.freeze())
    }

    async fn close(&self) -> Result<(), LoaderError> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_patterns;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct TestStore {
        sets: Mutex<HashMap<String, Vec<String>>>,
        hashes: Mutex<HashMap<String, Vec<(String, String)>>>,
        down: std::sync::atomic::AtomicBool,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for TestStore {
        async fn members(&self, key: &str) -> Result<Vec<String>, LoaderError> {
            if self.down.load(Ordering::Acquire) {
                return Err(LoaderError::store("connection refused"));
            }
            Ok(self.sets.lock().get(key).cloned().unwrap_or_default())
        }

        async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, LoaderError> {
            if self.down.load(Ordering::Acquire) {
                return Err(LoaderError::store("connection refused"));
            }
            Ok(self.hashes.lock().get(key).cloned().unwrap_or_default())
        }

        async fn close(&self) -> Result<(), LoaderError> {
            self.closes.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_set_loader() {
        let store = Arc::new(TestStore::default());
        store.sets.lock().insert(
            "policy".into(),
            vec!["10.0.0.0/8".into(), "*.example.com".into()],
        );

        let loader = KvSetLoader::new(store.clone(), None);
        assert_eq!(loader.key(), DEFAULT_KV_KEY);
        assert_eq!(loader.name(), "kv-set:policy");

        let data = loader.load().await.unwrap();
        assert_eq!(parse_patterns(&data), vec!["10.0.0.0/8", "*.example.com"]);
    }

    #[tokio::test]
    async fn test_set_loader_custom_key() {
        let store = Arc::new(TestStore::default());
        store
            .sets
            .lock()
            .insert("bypass".into(), vec!["a.com".into()]);

        let loader = KvSetLoader::new(store.clone(), Some("bypass".into()));
        assert_eq!(parse_patterns(&loader.load().await.unwrap()), vec!["a.com"]);

        let loader = KvSetLoader::new(store, Some(String::new()));
        assert_eq!(loader.key(), DEFAULT_KV_KEY);
        assert!(loader.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hash_loader_flattens_entries() {
        let store = Arc::new(TestStore::default());
        store.hashes.lock().insert(
            "policy".into(),
            vec![
                ("10.0.0.1".into(), "office".into()),
                ("a.com".into(), "# partner".into()),
            ],
        );

        let loader = KvHashLoader::new(store, None);
        assert_eq!(loader.name(), "kv-hash:policy");

        let data = loader.load().await.unwrap();
        assert_eq!(&data[..], b"10.0.0.1 office\na.com # partner\n");
        assert_eq!(parse_patterns(&data), vec!["10.0.0.1 office", "a.com"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(TestStore::default());
        store.down.store(true, Ordering::Release);

        let loader = KvSetLoader::new(store.clone(), None);
        assert!(matches!(loader.load().await, Err(LoaderError::Store(_))));

        let loader = KvHashLoader::new(store, None);
        assert!(matches!(loader.load().await, Err(LoaderError::Store(_))));
    }

    #[tokio::test]
    async fn test_close_closes_store() {
        let store = Arc::new(TestStore::default());
        let loader = KvSetLoader::new(store.clone(), None);
        loader.close().await.unwrap();
        assert_eq!(store.closes.load(Ordering::Acquire), 1);
    }
}
