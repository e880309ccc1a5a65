//! access-policy: Hot-reloadable admission and bypass policy engine
//!
//! This crate decides, per connection, whether a client may connect to a
//! listener (admission) or whether a destination should skip a routing hop
//! (bypass). Rules are IP literals, CIDR blocks, domains and wildcards,
//! gathered from static configuration and from reloadable rule sources.
//!
//! # Features
//!
//! - **Lock-free decisions**: rule sets are immutable snapshots swapped via `ArcSwap`
//! - **Four matcher families**: IP, CIDR, domain (exact and `.suffix`), wildcard
//! - **Periodic reload**: file, in-memory and key-value store sources
//! - **Degraded sources**: a failing source narrows one cycle, never the decision path
//! - **Redis**: set and hash collections behind the `redis` feature
//!
//! # Architecture
//!
//! ```text
//! Static patterns ─┐
//! FileLoader      ─┼→ parse_patterns → classify → CompiledRuleSet → ArcSwap
//! KvSetLoader     ─┘                                                   ↓
//!                                       listener/router → decide(addr) → bool
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use access_policy::loader::FileLoader;
//! use access_policy::{Admission, PolicyEngine, PolicyKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PolicyEngine::builder(PolicyKind::Admission)
//!     .matchers(["127.0.0.1", "10.0.0.0/8"])
//!     .loader(FileLoader::new("/etc/access-policy/admission.txt"))
//!     .reload_period(Duration::from_secs(60))
//!     .build()
//!     .await;
//!
//! if !engine.admit("203.0.113.7:51234") {
//!     // reject the connection
//! }
//!
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`error`]: Error types
//! - [`loader`]: Rule sources
//! - [`policy`]: `Admission` and `Bypass` traits
//! - [`rules`]: Matchers, compiled rule sets and the policy engine

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod loader;
pub mod policy;
pub mod rules;

// Re-export commonly used types at the crate root
pub use config::{load_config, load_config_str, PolicyConfig};
pub use error::{ConfigError, LoaderError, PolicyError, RuleError};
pub use loader::{FileLoader, MemoryLoader, RuleLoader};
pub use policy::{Admission, Bypass};
pub use rules::{CompiledRuleSet, PolicyEngine, PolicyEngineBuilder, PolicyKind};
