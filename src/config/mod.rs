//! Configuration module for access-policy
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use access_policy::config::load_config;
//! use access_policy::rules::{PolicyEngine, PolicyKind};
//!
//! # async fn example() -> Result<(), access_policy::PolicyError> {
//! let config = load_config("/etc/access-policy/admission.json")?;
//! let engine = PolicyEngine::from_config(PolicyKind::Admission, &config).await?;
//! println!("Loaded {} rules", engine.stats().total());
//! # Ok(())
//! # }
//! ```

mod loader;
mod types;

pub use loader::{load_config, load_config_str};
pub use types::{FileSourceConfig, PolicyConfig, RedisCollectionType, RedisSourceConfig};
