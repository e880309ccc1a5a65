//! In-memory rule source
//!
//! Holds rule text that can be replaced at runtime. Useful for rules pushed
//! by a control plane, and for exercising reload behavior without touching
//! the filesystem. A `MemoryLoader` can also be told to fail, which models
//! a source outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::RuleLoader;
use crate::error::LoaderError;

/// Swappable in-memory rule text
///
/// Clones share the same contents, so a handle kept by the caller can
/// update a loader that has been moved into an engine.
///
/// # Example
///
/// ```
/// use access_policy::loader::MemoryLoader;
///
/// let loader = MemoryLoader::new("10.0.0.0/8\n");
/// let handle = loader.clone();
/// handle.set(["192.168.0.0/16", "*.example.com"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    data: RwLock<Bytes>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemoryLoader {
    /// Create a loader holding `text`
    pub fn new(text: impl Into<Bytes>) -> Self {
        let loader = Self::default();
        *loader.inner.data.write() = text.into();
        loader
    }

    /// Replace the contents with the given patterns, one per line
    pub fn set<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.set_text(text);
    }

    /// Replace the raw contents
    pub fn set_text(&self, text: impl Into<Bytes>) {
        *self.inner.data.write() = text.into();
    }

    /// Make subsequent loads fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Release);
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RuleLoader for MemoryLoader {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Bytes, LoaderError> {
        if self.is_closed() {
            return Err(LoaderError::Closed);
        }
        if self.inner.failing.load(Ordering::Acquire) {
            return Err(LoaderError::store("memory source marked unavailable"));
        }
        Ok(self.inner.data.read().clone())
    }

    async fn close(&self) -> Result<(), LoaderError> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}
