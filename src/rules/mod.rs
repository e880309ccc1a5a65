//! Rule classification and matching
//!
//! This module provides:
//! - Pattern classification into four matcher families
//! - IP literal and CIDR matching
//! - Domain matching (exact and dotted suffix)
//! - Wildcard (glob) matching
//! - The immutable [`CompiledRuleSet`] snapshot the policy engine swaps on reload
//!
//! # Example
//!
//! ```
//! use access_policy::rules::{classify, CompiledRuleSet, MatcherFamily};
//!
//! assert_eq!(classify("192.168.0.0/16"), MatcherFamily::Cidr);
//!
//! let rules = CompiledRuleSet::compile([
//!     "192.168.0.0/16",
//!     "93.184.216.34",
//!     ".corp.internal",
//!     "*.example.com",
//! ])
//! .unwrap();
//!
//! assert!(rules.matches("192.168.7.7"));
//! assert!(rules.matches("93.184.216.34"));
//! assert!(rules.matches("git.corp.internal"));
//! assert!(rules.matches("api.example.com"));
//! assert!(!rules.matches("example.com"));
//! ```

pub mod domain;
pub mod engine;
pub mod ip;
pub mod types;
pub mod wildcard;

// Re-exports
pub use domain::{DomainMatcher, DomainMatcherBuilder};
pub use engine::{
    split_host_port, strip_port, PolicyEngine, PolicyEngineBuilder, PolicyKind,
    DEFAULT_LOAD_TIMEOUT, MIN_RELOAD_PERIOD,
};
pub use ip::{CidrMatcher, IpMatcher};
pub use types::{
    classify, CompiledRuleSet, CompiledRuleSetBuilder, MatcherFamily, Pattern, RuleSetStats,
};
pub use wildcard::WildcardMatcher;
