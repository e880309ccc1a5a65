//! Rule sources
//!
//! A rule source yields raw rule text on demand. The policy engine calls
//! every configured source once per reload cycle, parses the text with
//! [`parse_patterns`], and appends the result to its static pattern list.
//!
//! # Rule text format
//!
//! UTF-8, one rule per line. `#` starts a comment that runs to the end of
//! the line. Leading/trailing whitespace is trimmed and blank lines are
//! dropped. There is no escaping syntax.
//!
//! ```text
//! # office network
//! 10.0.0.0/8
//! 192.168.1.1   # gateway
//!
//! *.example.com
//! ```
//!
//! # Sources
//!
//! - [`FileLoader`]: whole contents of a file
//! - [`MemoryLoader`]: in-memory text that can be replaced at runtime
//! - [`KvSetLoader`] / [`KvHashLoader`]: a set or hash key in a [`KvStore`]

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::LoaderError;

pub mod file;
pub mod kv;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use file::FileLoader;
pub use kv::{KvHashLoader, KvSetLoader, KvStore, DEFAULT_KV_KEY};
pub use memory::MemoryLoader;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Trait for rule sources
///
/// Implementations perform their I/O inside `load`; the engine only calls
/// it from the reload cycle, never from the decision path. Each engine
/// owns its loaders exclusively and calls `close` exactly once on shutdown.
#[async_trait]
pub trait RuleLoader: Send + Sync + Debug {
    /// Short description used in log messages (e.g. `file:/etc/rules.txt`)
    fn name(&self) -> String;

    /// Fetch the current rule text
    ///
    /// # Errors
    ///
    /// Returns `LoaderError` if the underlying file or store cannot be read.
    async fn load(&self) -> Result<Bytes, LoaderError>;

    /// Release any resources held by the source
    ///
    /// # Errors
    ///
    /// Returns `LoaderError` if releasing the resource fails.
    async fn close(&self) -> Result<(), LoaderError> {
        Ok(())
    }
}

/// Parse rule text into an ordered list of patterns
///
/// Each line is cut at its first `#`, trimmed, and kept if non-empty.
/// Invalid UTF-8 is replaced rather than rejected, so a partially corrupt
/// file still yields its readable rules.
///
/// # Example
///
/// ```
/// use access_policy::loader::parse_patterns;
///
/// let text = b"10.0.0.1 # office\n\n  \n192.168.1.1\n";
/// assert_eq!(parse_patterns(text), vec!["10.0.0.1", "192.168.1.1"]);
/// ```
#[must_use]
pub fn parse_patterns(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .lines()
        .filter_map(|line| {
            let line = line.split_once('#').map_or(line, |(rule, _)| rule).trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect()
}
