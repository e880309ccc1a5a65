//! Redis-backed [`KvStore`]
//!
//! Sets are read with `SMEMBERS`, hashes with `HGETALL`. The connection is
//! opened lazily on first use and re-opened after any failed round trip, so
//! a Redis restart only costs the reload cycles that overlap the outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::debug;

use super::kv::KvStore;
use crate::error::LoaderError;

/// Redis client used by the key-value rule sources
pub struct RedisStore {
    client: Client,
    addr: String,
    conn: Mutex<Option<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store for `addr` (`host:port`)
    ///
    /// No connection is made until the first load.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::Store` if the address cannot be turned into a
    /// connection URL.
    pub fn new(addr: &str, db: i64, password: Option<&str>) -> Result<Self, LoaderError> {
        let auth = password
            .filter(|p| !p.is_empty())
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        let url = format!("redis://{auth}{addr}/{db}");
        let client = Client::open(url.as_str())
            .map_err(|e| LoaderError::store(format!("invalid redis address {addr}: {e}")))?;

        Ok(Self {
            client,
            addr: addr.to_string(),
            conn: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, LoaderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoaderError::Closed);
        }

        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LoaderError::store(format!("connect {}: {e}", self.addr)))?;
        debug!(addr = %self.addr, "Connected to redis rule store");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.conn.lock().await.take();
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn members(&self, key: &str) -> Result<Vec<String>, LoaderError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Vec<String>> = conn.smembers(key).await;
        match result {
            Ok(members) => Ok(members),
            Err(e) => {
                self.reset().await;
                Err(LoaderError::store(format!("SMEMBERS {key}: {e}")))
            }
        }
    }

    async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, LoaderError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<HashMap<String, String>> = conn.hgetall(key).await;
        match result {
            Ok(map) => Ok(map.into_iter().collect()),
            Err(e) => {
                self.reset().await;
                Err(LoaderError::store(format!("HGETALL {key}: {e}")))
            }
        }
    }

    async fn close(&self) -> Result<(), LoaderError> {
        self.closed.store(true, Ordering::Release);
        self.reset().await;
        Ok(())
    }
}
