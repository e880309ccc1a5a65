//! Core rule types for the policy engine
//!
//! This module defines:
//! - [`MatcherFamily`]: the four disjoint families a pattern can belong to
//! - [`Pattern`]: a classified pattern carrying its parsed value
//! - [`classify`]: the total classification function
//! - [`CompiledRuleSet`]: an immutable snapshot of all four matchers
//!
//! # Classification
//!
//! Precedence is fixed and every pattern lands in exactly one family:
//!
//! 1. Parses as an IPv4/IPv6 literal → [`MatcherFamily::Ip`]
//! 2. Parses as CIDR notation → [`MatcherFamily::Cidr`]
//! 3. Contains `*` or `?` → [`MatcherFamily::Wildcard`]
//! 4. Anything else → [`MatcherFamily::Domain`]

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use super::domain::{DomainMatcher, DomainMatcherBuilder};
use super::ip::{CidrMatcher, IpMatcher};
use super::wildcard::WildcardMatcher;
use crate::error::RuleError;

/// Matcher family of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherFamily {
    /// Literal IP address (e.g., "192.168.1.1", "2001:db8::1")
    Ip,

    /// CIDR network block (e.g., "10.0.0.0/8", "fd00::/8")
    Cidr,

    /// Domain literal, or dotted suffix when it starts with '.'
    Domain,

    /// Glob pattern with `*` / `?`
    Wildcard,
}

impl fmt::Display for MatcherFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip => write!(f, "ip"),
            Self::Cidr => write!(f, "cidr"),
            Self::Domain => write!(f, "domain"),
            Self::Wildcard => write!(f, "wildcard"),
        }
    }
}

/// A classified pattern
///
/// IP and CIDR patterns carry their parsed values so compilation never
/// parses twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Literal IP address
    Ip(IpAddr),
    /// CIDR block
    Cidr(IpNet),
    /// Domain literal or dotted suffix
    Domain(String),
    /// Glob pattern
    Wildcard(String),
}

impl Pattern {
    /// Classify a raw pattern string
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if let Ok(ip) = pattern.parse::<IpAddr>() {
            return Self::Ip(ip);
        }
        if let Ok(net) = pattern.parse::<IpNet>() {
            return Self::Cidr(net);
        }
        if pattern.contains(['*', '?']) {
            return Self::Wildcard(pattern.to_string());
        }
        Self::Domain(pattern.to_string())
    }

    /// The family this pattern belongs to
    #[must_use]
    pub const fn family(&self) -> MatcherFamily {
        match self {
            Self::Ip(_) => MatcherFamily::Ip,
            Self::Cidr(_) => MatcherFamily::Cidr,
            Self::Domain(_) => MatcherFamily::Domain,
            Self::Wildcard(_) => MatcherFamily::Wildcard,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Cidr(net) => write!(f, "{net}"),
            Self::Domain(d) | Self::Wildcard(d) => f.write_str(d),
        }
    }
}

/// Map a pattern string to its matcher family
///
/// Pure and total.
///
/// # Example
///
/// ```
/// use access_policy::rules::{classify, MatcherFamily};
///
/// assert_eq!(classify("10.0.0.1"), MatcherFamily::Ip);
/// assert_eq!(classify("10.0.0.0/8"), MatcherFamily::Cidr);
/// assert_eq!(classify("*.example.com"), MatcherFamily::Wildcard);
/// assert_eq!(classify("example.com"), MatcherFamily::Domain);
/// ```
#[must_use]
pub fn classify(pattern: &str) -> MatcherFamily {
    Pattern::parse(pattern).family()
}

/// Immutable snapshot of all four matchers
///
/// A rule set is never mutated after it is built. Reloads build a new one
/// and swap it in whole.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    ip: IpMatcher,
    cidr: CidrMatcher,
    domain: DomainMatcher,
    wildcard: WildcardMatcher,
}

impl CompiledRuleSet {
    /// Create an empty rule set that matches nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classify and compile a list of patterns
    ///
    /// # Errors
    ///
    /// Returns `RuleError::CompilationError` if the domain or wildcard
    /// matcher cannot be built.
    ///
    /// # Example
    ///
    /// ```
    /// use access_policy::rules::CompiledRuleSet;
    ///
    /// let rules = CompiledRuleSet::compile(["10.0.0.0/8", "*.example.com"]).unwrap();
    /// assert!(rules.matches("10.1.2.3"));
    /// assert!(rules.matches("www.example.com"));
    /// assert!(!rules.matches("example.org"));
    /// ```
    pub fn compile<I, S>(patterns: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .fold(CompiledRuleSetBuilder::new(), |b, p| b.add(p.as_ref()))
            .build()
    }

    /// Check a candidate host (no port) against the matchers
    ///
    /// IP candidates consult only the IP and CIDR matchers; everything else
    /// consults only the domain and wildcard matchers.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return self.ip.contains(ip) || self.cidr.contains(ip);
        }
        self.domain.matches(candidate) || self.wildcard.matches(candidate)
    }

    /// Whether every matcher is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ip.is_empty()
            && self.cidr.is_empty()
            && self.domain.is_empty()
            && self.wildcard.is_empty()
    }

    /// Get per-family rule counts
    #[must_use]
    pub fn stats(&self) -> RuleSetStats {
        RuleSetStats {
            ip_rules: self.ip.len(),
            cidr_rules: self.cidr.len(),
            domain_rules: self.domain.rule_count(),
            wildcard_rules: self.wildcard.len(),
        }
    }
}

/// Rule counts of a compiled rule set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleSetStats {
    /// Number of distinct literal IPs
    pub ip_rules: usize,
    /// Number of CIDR blocks
    pub cidr_rules: usize,
    /// Number of distinct domain rules
    pub domain_rules: usize,
    /// Number of glob patterns
    pub wildcard_rules: usize,
}

impl RuleSetStats {
    /// Total across all families
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ip_rules + self.cidr_rules + self.domain_rules + self.wildcard_rules
    }
}

/// Builder for `CompiledRuleSet`
///
/// Blank patterns are skipped; everything else is classified with
/// [`Pattern::parse`] and routed to its family.
#[derive(Debug, Default)]
pub struct CompiledRuleSetBuilder {
    ips: Vec<IpAddr>,
    cidrs: Vec<IpNet>,
    domains: DomainMatcherBuilder,
    wildcards: Vec<String>,
}

impl CompiledRuleSetBuilder {
    /// Create a new empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw pattern string
    #[must_use]
    pub fn add(self, pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return self;
        }
        self.add_pattern(Pattern::parse(pattern))
    }

    /// Add an already classified pattern
    #[must_use]
    pub fn add_pattern(mut self, pattern: Pattern) -> Self {
        match pattern {
            Pattern::Ip(ip) => self.ips.push(ip),
            Pattern::Cidr(net) => self.cidrs.push(net),
            Pattern::Domain(domain) => self.domains = self.domains.add(domain),
            Pattern::Wildcard(glob) => self.wildcards.push(glob),
        }
        self
    }

    /// Compile the four matchers
    ///
    /// # Errors
    ///
    /// Returns `RuleError::CompilationError` if a matcher fails to build.
    pub fn build(self) -> Result<CompiledRuleSet, RuleError> {
        let wildcard = if self.wildcards.is_empty() {
            WildcardMatcher::empty()
        } else {
            WildcardMatcher::new(&self.wildcards)?
        };

        Ok(CompiledRuleSet {
            ip: IpMatcher::new(self.ips),
            cidr: CidrMatcher::new(self.cidrs),
            domain: self.domains.build()?,
            wildcard,
        })
    }
}
