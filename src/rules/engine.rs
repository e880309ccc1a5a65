//! Hot-reloadable policy engine
//!
//! This module provides the admission/bypass decision engine. It uses
//! `ArcSwap` for lock-free reads on the connection path and a background
//! task for periodic reloads from rule sources.
//!
//! # Architecture
//!
//! The engine holds an immutable [`CompiledRuleSet`] that is atomically
//! swapped on reload. A decision takes one snapshot reference and never
//! observes a mix of two rule sets.
//!
//! ```text
//! Listener / router -> PolicyEngine::decide() -> ArcSwap::load() -> CompiledRuleSet
//!                                                     |
//!                                              (lock-free read)
//!
//! Reload task ----> load sources -> compile -> ArcSwap::store() -> old set dropped
//!   (ticker)        (timeout per source)           |               when readers finish
//!                                           (atomic swap)
//! ```
//!
//! # Decision
//!
//! 1. An empty address is rejected (`false`)
//! 2. The port is stripped when the address is `host:port` with a non-empty
//!    host and a port in `1..=65535` (see [`strip_port`])
//! 3. IP candidates consult the IP and CIDR matchers, everything else the
//!    domain and wildcard matchers
//! 4. The result is `matched != reverse`
//!
//! # Example
//!
//! ```
//! use access_policy::rules::{PolicyEngine, PolicyKind};
//!
//! let engine = PolicyEngine::from_patterns(
//!     PolicyKind::Bypass,
//!     false,
//!     ["10.0.0.0/8", "*.example.com"],
//! );
//!
//! assert!(engine.decide("10.1.2.3:443"));
//! assert!(engine.decide("api.example.com"));
//! assert!(!engine.decide("example.org"));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::types::{CompiledRuleSet, RuleSetStats};
use crate::config::PolicyConfig;
use crate::error::LoaderError;
use crate::loader::{parse_patterns, RuleLoader};

/// Lower bound for the reload period
pub const MIN_RELOAD_PERIOD: Duration = Duration::from_secs(1);

/// Default per-source load timeout
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Which side of the proxy the engine guards
///
/// Both kinds share the decision algorithm and differ only in what they
/// log: admission logs denied connections, bypass logs addresses that
/// skip normal routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Inbound connection gate at a listener
    Admission,
    /// Outbound hop exclusion in the router
    Bypass,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admission => write!(f, "admission"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

/// Split `host:port` or `[host]:port`
///
/// Returns `None` when there is no port separator, when an unbracketed
/// host contains a colon (a bare IPv6 literal), or when brackets are
/// malformed. The port is returned unparsed and may be empty.
///
/// # Example
///
/// ```
/// use access_policy::rules::split_host_port;
///
/// assert_eq!(split_host_port("example.com:443"), Some(("example.com", "443")));
/// assert_eq!(split_host_port("[::1]:80"), Some(("::1", "80")));
/// assert_eq!(split_host_port("::1"), None);
/// assert_eq!(split_host_port("example.com"), None);
/// ```
#[must_use]
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    let colon = addr.rfind(':')?;
    let port = &addr[colon + 1..];

    let host = if let Some(rest) = addr.strip_prefix('[') {
        let close = rest.find(']')?;
        // "]" must be immediately followed by the last ':'
        if close + 2 != colon {
            return None;
        }
        &rest[..close]
    } else {
        let host = &addr[..colon];
        if host.contains(':') {
            return None;
        }
        host
    };

    if host.contains(['[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}

/// Strip a valid port from `addr`
///
/// The port is removed only when `addr` splits into a non-empty host and a
/// port that parses as an integer in `1..=65535`. Anything else
/// (`"example.com:abc"`, `"example.com:0"`, `"example.com:"`, a bare IPv6
/// literal) is returned unchanged and matched verbatim.
///
/// # Example
///
/// ```
/// use access_policy::rules::strip_port;
///
/// assert_eq!(strip_port("93.184.216.34:443"), "93.184.216.34");
/// assert_eq!(strip_port("[2001:db8::1]:443"), "2001:db8::1");
/// assert_eq!(strip_port("example.com:abc"), "example.com:abc");
/// assert_eq!(strip_port("example.com"), "example.com");
/// ```
#[must_use]
pub fn strip_port(addr: &str) -> &str {
    match split_host_port(addr) {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0) => host,
        _ => addr,
    }
}

/// State shared between the engine handle and its reload task
struct Shared {
    kind: PolicyKind,
    reverse: bool,

    /// Statically configured patterns, present in every snapshot
    matchers: Vec<String>,

    /// Rule sources, owned exclusively by this engine
    loaders: Vec<Box<dyn RuleLoader>>,

    load_timeout: Duration,

    /// Current rule set (lock-free reads via `ArcSwap`)
    rules: ArcSwap<CompiledRuleSet>,

    /// Number of snapshots compiled so far
    version: AtomicU64,

    /// Serializes reload cycles; held by `close` while sources are released
    reload_lock: tokio::sync::Mutex<()>,

    closed: AtomicBool,
}

impl Shared {
    /// Run one load-and-compile cycle and swap in the result
    async fn reload(&self) {
        let _guard = self.reload_lock.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut patterns = self.matchers.clone();
        patterns.extend(self.load().await);

        match CompiledRuleSet::compile(&patterns) {
            Ok(rules) => {
                let stats = rules.stats();
                self.rules.store(Arc::new(rules));
                let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(
                    kind = %self.kind,
                    version,
                    ip = stats.ip_rules,
                    cidr = stats.cidr_rules,
                    domain = stats.domain_rules,
                    wildcard = stats.wildcard_rules,
                    "Policy rules reloaded"
                );
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Rule compilation failed, keeping previous rule set");
            }
        }
    }

    /// Fetch patterns from every source
    ///
    /// A failing or slow source contributes nothing for this cycle.
    async fn load(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        for loader in &self.loaders {
            let result = match tokio::time::timeout(self.load_timeout, loader.load()).await {
                Ok(result) => result,
                Err(_) => Err(LoaderError::Timeout {
                    source_name: loader.name(),
                    timeout: self.load_timeout,
                }),
            };

            match result {
                Ok(data) => patterns.extend(parse_patterns(&data)),
                Err(e) => {
                    warn!(kind = %self.kind, source = %loader.name(), error = %e, "Rule source load failed");
                }
            }
        }
        patterns
    }
}

/// Hot-reloadable admission/bypass policy engine
///
/// Decisions are synchronous, lock-free and never touch I/O. Reloads run
/// on a background task when a reload period is configured; otherwise the
/// rules stay fixed after construction.
///
/// # Thread Safety
///
/// The engine is `Send + Sync` and meant to be shared behind an `Arc`
/// between every connection-handling task of a listener or router.
pub struct PolicyEngine {
    shared: Arc<Shared>,

    /// Shutdown signal for the reload task; dropping it also stops the task
    shutdown_tx: broadcast::Sender<()>,

    /// Background reload task handle
    reload_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PolicyEngine {
    /// Create a new builder
    #[must_use]
    pub fn builder(kind: PolicyKind) -> PolicyEngineBuilder {
        PolicyEngineBuilder::new(kind)
    }

    /// Create an engine from static patterns only
    ///
    /// No runtime is required and no background task is started.
    pub fn from_patterns<I, S>(kind: PolicyKind, reverse: bool, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let builder = PolicyEngineBuilder::new(kind)
            .reverse(reverse)
            .matchers(patterns);

        let rules = CompiledRuleSet::compile(&builder.matchers).unwrap_or_else(|e| {
            warn!(kind = %kind, error = %e, "Rule compilation failed, starting with empty rule set");
            CompiledRuleSet::empty()
        });

        let engine = Self::with_shared(builder.into_shared());
        engine.shared.rules.store(Arc::new(rules));
        engine.shared.version.store(1, Ordering::Release);
        engine
    }

    /// Build an engine from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::Config` if the configuration is invalid or
    /// names a source this build cannot provide.
    pub async fn from_config(kind: PolicyKind, config: &PolicyConfig) -> crate::error::Result<Self> {
        Ok(config.to_builder(kind)?.build().await)
    }

    fn with_shared(shared: Shared) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shared: Arc::new(shared),
            shutdown_tx,
            reload_handle: parking_lot::Mutex::new(None),
        }
    }

    /// Decide whether `addr` is permitted (admission) or bypassed (bypass)
    ///
    /// Never blocks and never fails. Repeated calls without an intervening
    /// reload return the same result.
    #[must_use]
    pub fn decide(&self, addr: &str) -> bool {
        if addr.is_empty() {
            if self.shared.kind == PolicyKind::Admission {
                debug!("admission: empty address is denied");
            }
            return false;
        }

        let host = strip_port(addr);
        let matched = self.shared.rules.load().matches(host);
        let decision = matched != self.shared.reverse;

        match self.shared.kind {
            PolicyKind::Admission if !decision => debug!(addr = %host, "admission: address is denied"),
            PolicyKind::Bypass if decision => debug!(addr = %host, "bypass: address bypasses routing"),
            _ => {}
        }
        decision
    }

    /// Run one reload cycle now
    ///
    /// Does nothing once the engine is closed.
    pub async fn reload(&self) {
        self.shared.reload().await;
    }

    /// Stop the reload task and release every rule source
    ///
    /// Idempotent. Decisions keep working against the last compiled rule
    /// set after close. The periodic cycle is cancelled; a manual `reload`
    /// already in flight is allowed to finish (bounded by the load timeout)
    /// before any source is closed, so no snapshot is stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first `LoaderError` raised while closing sources; every
    /// source is closed regardless.
    pub async fn close(&self) -> crate::error::Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());
        let handle = self.reload_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(kind = %self.shared.kind, error = %e, "Reload task ended abnormally");
            }
        }

        let _guard = self.shared.reload_lock.lock().await;

        let mut first_error = None;
        for loader in &self.shared.loaders {
            if let Err(e) = loader.close().await {
                warn!(kind = %self.shared.kind, source = %loader.name(), error = %e, "Failed to close rule source");
                first_error.get_or_insert(e);
            }
        }

        info!(kind = %self.shared.kind, version = self.version(), "Policy engine closed");
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Current rule set snapshot
    ///
    /// Useful for evaluating many candidates against one consistent
    /// rule set.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
        self.shared.rules.load_full()
    }

    /// Number of rule sets compiled so far (0 before the first compile)
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }

    /// Rule counts of the current snapshot
    #[must_use]
    pub fn stats(&self) -> RuleSetStats {
        self.shared.rules.load().stats()
    }

    /// Engine kind
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.shared.kind
    }

    /// Whether the match-to-decision mapping is inverted
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.shared.reverse
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("PolicyEngine")
            .field("kind", &self.shared.kind)
            .field("reverse", &self.shared.reverse)
            .field("version", &self.version())
            .field("sources", &self.shared.loaders.len())
            .field("rules", &stats.total())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Background reload loop
///
/// The first reload happens one period after start, since construction
/// already loaded once. Shutdown cancels an in-flight cycle.
async fn reload_loop(shared: Arc<Shared>, period: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => break,

            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    () = shared.reload() => {}
                }
            }
        }
    }

    debug!(kind = %shared.kind, "Policy reload task stopped");
}

/// Builder for `PolicyEngine`
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use access_policy::loader::FileLoader;
/// use access_policy::rules::{PolicyEngine, PolicyKind};
///
/// # async fn example() {
/// let engine = PolicyEngine::builder(PolicyKind::Admission)
///     .matchers(["127.0.0.1", "10.0.0.0/8"])
///     .loader(FileLoader::new("/etc/policy/admission.txt"))
///     .reload_period(Duration::from_secs(30))
///     .build()
///     .await;
///
/// assert!(engine.decide("10.1.1.1:52000"));
/// engine.close().await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct PolicyEngineBuilder {
    kind: PolicyKind,
    reverse: bool,
    matchers: Vec<String>,
    loaders: Vec<Box<dyn RuleLoader>>,
    reload_period: Option<Duration>,
    load_timeout: Duration,
}

impl PolicyEngineBuilder {
    /// Create a new builder with no rules and no sources
    #[must_use]
    pub fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            reverse: false,
            matchers: Vec::new(),
            loaders: Vec::new(),
            reload_period: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    /// Invert the match-to-decision mapping
    #[must_use]
    pub const fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Add static patterns
    #[must_use]
    pub fn matchers<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.matchers.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add a rule source
    #[must_use]
    pub fn loader(self, loader: impl RuleLoader + 'static) -> Self {
        self.boxed_loader(Box::new(loader))
    }

    /// Add a boxed rule source
    #[must_use]
    pub fn boxed_loader(mut self, loader: Box<dyn RuleLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Enable periodic reload
    ///
    /// A zero period disables reload; anything below one second is raised
    /// to one second.
    #[must_use]
    pub fn reload_period(mut self, period: Duration) -> Self {
        self.reload_period = (!period.is_zero()).then(|| period.max(MIN_RELOAD_PERIOD));
        self
    }

    /// Bound each source load
    #[must_use]
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.load_timeout = timeout;
        }
        self
    }

    fn into_shared(self) -> Shared {
        Shared {
            kind: self.kind,
            reverse: self.reverse,
            matchers: self.matchers,
            loaders: self.loaders,
            load_timeout: self.load_timeout,
            rules: ArcSwap::from_pointee(CompiledRuleSet::empty()),
            version: AtomicU64::new(0),
            reload_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Build the engine
    ///
    /// Loads every source and compiles once before returning, then starts
    /// the reload task if a period is set. Source failures are logged and
    /// leave the engine with whatever rules did load.
    pub async fn build(self) -> PolicyEngine {
        let reload_period = self.reload_period;
        let engine = PolicyEngine::with_shared(self.into_shared());

        engine.shared.reload().await;

        if let Some(period) = reload_period {
            let shutdown_rx = engine.shutdown_tx.subscribe();
            let handle = tokio::spawn(reload_loop(Arc::clone(&engine.shared), period, shutdown_rx));
            *engine.reload_handle.lock() = Some(handle);
        }

        info!(
            kind = %engine.shared.kind,
            reverse = engine.shared.reverse,
            sources = engine.shared.loaders.len(),
            rules = engine.stats().total(),
            reload_secs = reload_period.map_or(0, |p| p.as_secs()),
            "Policy engine started"
        );
        engine
    }
}
