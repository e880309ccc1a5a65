//! Configuration types for access-policy
//!
//! One `PolicyConfig` describes one engine: its static patterns, its rule
//! sources and its reload behavior. Configuration is loaded from JSON and
//! validated before any engine is built.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::loader::{FileLoader, DEFAULT_KV_KEY};
use crate::rules::{PolicyEngineBuilder, PolicyKind};

/// Engine configuration
///
/// # Example
///
/// ```
/// use access_policy::config::PolicyConfig;
///
/// let config: PolicyConfig = serde_json::from_str(r#"{
///     "matchers": ["10.0.0.0/8", "*.example.com"],
///     "reload_secs": 30,
///     "file": { "path": "/etc/policy/rules.txt" }
/// }"#).unwrap();
///
/// assert!(config.validate().is_ok());
/// assert!(!config.reverse);
/// assert_eq!(config.load_timeout_secs, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Invert the match-to-decision mapping
    #[serde(default)]
    pub reverse: bool,

    /// Static patterns, present in every rule set
    #[serde(default)]
    pub matchers: Vec<String>,

    /// Reload period in seconds (0 disables periodic reload)
    #[serde(default)]
    pub reload_secs: u64,

    /// Per-source load timeout in seconds
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Rule file source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSourceConfig>,

    /// Redis source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisSourceConfig>,
}

fn default_load_timeout_secs() -> u64 {
    10
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reverse: false,
            matchers: Vec::new(),
            reload_secs: 0,
            load_timeout_secs: default_load_timeout_secs(),
            file: None,
            redis: None,
        }
    }
}

impl PolicyConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "load_timeout_secs must be greater than 0",
            ));
        }

        if let Some(file) = &self.file {
            file.validate()?;
        }

        if let Some(redis) = &self.redis {
            redis.validate()?;
        }

        Ok(())
    }

    /// Reload period, `None` when periodic reload is disabled
    #[must_use]
    pub const fn reload_period(&self) -> Option<Duration> {
        if self.reload_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.reload_secs))
        }
    }

    /// Per-source load timeout
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Number of configured rule sources
    #[must_use]
    pub fn source_count(&self) -> usize {
        usize::from(self.file.is_some()) + usize::from(self.redis.is_some())
    }

    /// Turn this configuration into an engine builder
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is
    /// invalid, or if it names a Redis source and the `redis` feature is
    /// disabled.
    pub fn to_builder(&self, kind: PolicyKind) -> Result<PolicyEngineBuilder, ConfigError> {
        self.validate()?;

        let mut builder = PolicyEngineBuilder::new(kind)
            .reverse(self.reverse)
            .matchers(self.matchers.iter().cloned())
            .load_timeout(self.load_timeout());

        if let Some(period) = self.reload_period() {
            builder = builder.reload_period(period);
        }

        if let Some(file) = &self.file {
            builder = builder.loader(FileLoader::new(file.path.clone()));
        }

        if let Some(redis) = &self.redis {
            builder = redis.attach(builder)?;
        }

        Ok(builder)
    }
}

/// Rule file source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileSourceConfig {
    /// Path of the rule file, re-read on every reload
    pub path: PathBuf,
}

impl FileSourceConfig {
    /// Validate the file source
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the path is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::validation("file.path cannot be empty"));
        }
        Ok(())
    }
}

/// Shape of the Redis collection holding the rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedisCollectionType {
    /// Every set member is one rule line
    #[default]
    Set,
    /// Every hash entry becomes a `"field value"` line
    Hash,
}

/// Redis rule source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RedisSourceConfig {
    /// Server address (`host:port`)
    pub addr: String,

    /// Database index
    #[serde(default)]
    pub db: i64,

    /// Optional password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Collection key
    #[serde(default = "default_redis_key")]
    pub key: String,

    /// Collection shape
    #[serde(default, rename = "type")]
    pub collection: RedisCollectionType,
}

fn default_redis_key() -> String {
    DEFAULT_KV_KEY.to_string()
}

impl RedisSourceConfig {
    /// Validate the Redis source
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the address is empty or
    /// the database index is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::validation("redis.addr cannot be empty"));
        }
        if self.db < 0 {
            return Err(ConfigError::validation(format!(
                "redis.db must be non-negative, got {}",
                self.db
            )));
        }
        Ok(())
    }

    #[cfg(feature = "redis")]
    fn attach(&self, builder: PolicyEngineBuilder) -> Result<PolicyEngineBuilder, ConfigError> {
        use std::sync::Arc;

        use crate::loader::{KvHashLoader, KvSetLoader, KvStore, RedisStore};

        let store: Arc<dyn KvStore> = Arc::new(
            RedisStore::new(&self.addr, self.db, self.password.as_deref())
                .map_err(|e| ConfigError::validation(e.to_string()))?,
        );
        let key = Some(self.key.clone());

        Ok(match self.collection {
            RedisCollectionType::Set => builder.loader(KvSetLoader::new(store, key)),
            RedisCollectionType::Hash => builder.loader(KvHashLoader::new(store, key)),
        })
    }

    #[cfg(not(feature = "redis"))]
    #[allow(clippy::unused_self)]
    fn attach(&self, _builder: PolicyEngineBuilder) -> Result<PolicyEngineBuilder, ConfigError> {
        Err(ConfigError::validation(format!(
            "redis source {} requires the `redis` feature",
            self.addr
        )))
    }
}
