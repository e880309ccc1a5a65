//! Domain matcher using hash lookup and an Aho-Corasick suffix automaton
//!
//! Two forms of domain rule are supported:
//!
//! - **Exact**: `example.com` matches only `example.com`. O(1) hash lookup.
//! - **Dotted suffix**: `.example.com` matches `example.com` itself and every
//!   subdomain of it (`www.example.com`, `a.b.example.com`), but never
//!   `notexample.com`. O(n) in the domain length.
//!
//! Matching is ASCII case-insensitive and ignores a single trailing dot on
//! the candidate (`example.com.` is treated as `example.com`).
//!
//! # Example
//!
//! ```
//! use access_policy::rules::domain::DomainMatcher;
//!
//! let matcher = DomainMatcher::builder()
//!     .add("example.com")
//!     .add(".corp.internal")
//!     .build()
//!     .unwrap();
//!
//! assert!(matcher.matches("example.com"));
//! assert!(!matcher.matches("www.example.com"));
//! assert!(matcher.matches("corp.internal"));
//! assert!(matcher.matches("git.corp.internal"));
//! ```

use std::collections::HashSet;

use aho_corasick::AhoCorasick;

use crate::error::RuleError;

/// Domain set with exact and dotted-suffix rules
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    /// Lowercased exact domains
    exact_domains: HashSet<String>,

    /// Automaton over reversed suffixes, each with a leading dot
    /// (`.corp.internal` is stored as `.lanretni.proc`)
    suffix_automaton: Option<AhoCorasick>,

    /// Reversed suffix patterns indexed by automaton pattern ID
    suffix_patterns: Vec<String>,
}

impl DomainMatcher {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> DomainMatcherBuilder {
        DomainMatcherBuilder::new()
    }

    /// Create an empty domain matcher
    ///
    /// An empty matcher reports no match for every candidate.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check whether `domain` matches any rule
    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.strip_suffix('.').unwrap_or(domain);
        if domain.is_empty() || self.is_empty() {
            return false;
        }

        let domain_lower = domain.to_ascii_lowercase();

        if self.exact_domains.contains(&domain_lower) {
            return true;
        }

        self.match_suffix(&domain_lower)
    }

    /// Match using suffix patterns
    ///
    /// Uses reversed domain matching:
    /// - Rule `.corp.internal` is stored as `.lanretni.proc`
    /// - Domain `git.corp.internal` is searched as `.lanretni.proc.tig`
    /// - A pattern found at position 0 that ends at a dot or at the end of
    ///   the reversed domain is a suffix match
    ///
    /// Overlapping search is required: with rules for both `a.com` and
    /// `ba.com`, the shorter pattern is a prefix of the longer one in
    /// reversed form and must not hide it.
    fn match_suffix(&self, domain: &str) -> bool {
        let Some(automaton) = self.suffix_automaton.as_ref() else {
            return false;
        };

        let reversed: String = format!(".{}", domain.chars().rev().collect::<String>());
        let bytes = reversed.as_bytes();

        automaton.find_overlapping_iter(&reversed).any(|mat| {
            mat.start() == 0
                && mat.len() == self.suffix_patterns[mat.pattern().as_usize()].len()
                && (mat.end() == bytes.len() || bytes[mat.end()] == b'.')
        })
    }

    /// Whether the matcher has no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact_domains.is_empty() && self.suffix_patterns.is_empty()
    }

    /// Total number of rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.exact_domains.len() + self.suffix_patterns.len()
    }

    /// Number of exact rules
    #[must_use]
    pub fn exact_count(&self) -> usize {
        self.exact_domains.len()
    }

    /// Number of dotted-suffix rules
    #[must_use]
    pub fn suffix_count(&self) -> usize {
        self.suffix_patterns.len()
    }
}

/// Builder for `DomainMatcher`
///
/// A pattern starting with `.` becomes a suffix rule; anything else is an
/// exact rule. Duplicate rules collapse.
#[derive(Debug, Default)]
pub struct DomainMatcherBuilder {
    exact: Vec<String>,
    suffix: Vec<String>,
}

impl DomainMatcherBuilder {
    /// Create a new empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain rule
    ///
    /// Empty patterns (and a lone `.`) are ignored.
    #[must_use]
    pub fn add(mut self, pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref().to_ascii_lowercase();
        match pattern.strip_prefix('.') {
            Some("") => {}
            Some(suffix) => self.suffix.push(suffix.to_string()),
            None if pattern.is_empty() => {}
            None => self.exact.push(pattern),
        }
        self
    }

    /// Number of rules added so far
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.exact.len() + self.suffix.len()
    }

    /// Compile the collected rules
    ///
    /// # Errors
    ///
    /// Returns `RuleError::CompilationError` if the suffix automaton cannot
    /// be built.
    pub fn build(self) -> Result<DomainMatcher, RuleError> {
        let exact_domains: HashSet<String> = self.exact.into_iter().collect();

        let mut seen = HashSet::with_capacity(self.suffix.len());
        let suffix_patterns: Vec<String> = self
            .suffix
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .map(|suffix| format!(".{}", suffix.chars().rev().collect::<String>()))
            .collect();

        let suffix_automaton = if suffix_patterns.is_empty() {
            None
        } else {
            let automaton = AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(&suffix_patterns)
                .map_err(|e| RuleError::compilation("domain", format!("suffix automaton: {e}")))?;
            Some(automaton)
        };

        Ok(DomainMatcher {
            exact_domains,
            suffix_automaton,
            suffix_patterns,
        })
    }
}
