//! Wildcard (glob) matcher
//!
//! Glob rules use two metacharacters:
//!
//! - `*` matches any run of characters, including none and including dots,
//!   so `*.example.com` matches both `a.example.com` and `a.b.example.com`
//! - `?` matches exactly one character
//!
//! Every other character is literal. Each glob is anchored to the whole
//! candidate, and matching is case-insensitive like the domain matcher.
//!
//! All globs are compiled into a single `RegexSet`, so a lookup is one pass
//! over the candidate regardless of how many rules are loaded.
//!
//! # Example
//!
//! ```
//! use access_policy::rules::wildcard::WildcardMatcher;
//!
//! let matcher = WildcardMatcher::new(["*.example.com", "ex?mple.org"]).unwrap();
//! assert!(matcher.matches("a.example.com"));
//! assert!(!matcher.matches("example.com"));
//! assert!(matcher.matches("exAmple.org"));
//! assert!(!matcher.matches("exxxmple.org"));
//! ```

use regex::{RegexSet, RegexSetBuilder};

use crate::error::RuleError;

/// Maximum compiled size of the combined glob set
const WILDCARD_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// Anchored glob set
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    set: RegexSet,
}

impl Default for WildcardMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl WildcardMatcher {
    /// Compile a set of glob patterns
    ///
    /// # Errors
    ///
    /// Returns `RuleError::CompilationError` if the combined set exceeds the
    /// compiled size limit.
    pub fn new<I, S>(globs: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regexes: Vec<String> = globs
            .into_iter()
            .map(|glob| glob_to_regex(glob.as_ref()))
            .collect();

        let set = RegexSetBuilder::new(regexes)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .size_limit(WILDCARD_SIZE_LIMIT)
            .build()
            .map_err(|e| RuleError::compilation("wildcard", e))?;

        Ok(Self { set })
    }

    /// Create an empty matcher that never matches
    #[must_use]
    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    /// Check whether `candidate` matches any glob
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        !self.set.is_empty() && self.set.is_match(candidate)
    }

    /// Number of globs
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Translate a glob into an anchored regular expression
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');

    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}
