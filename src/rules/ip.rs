//! IP literal and CIDR block matchers
//!
//! Two of the four matcher families live here:
//!
//! - **`IpMatcher`**: exact equality against a set of literal addresses, O(1)
//! - **`CidrMatcher`**: containment in any of a list of network blocks, O(n)
//!
//! Both accept IPv4 and IPv6. IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`)
//! are canonicalized to plain IPv4 on both sides, so `::ffff:10.0.0.1`
//! matches a rule written as `10.0.0.1`.
//!
//! # Example
//!
//! ```
//! use access_policy::rules::ip::{CidrMatcher, IpMatcher};
//!
//! let ips = IpMatcher::new(["192.168.1.1".parse().unwrap()]);
//! assert!(ips.matches("192.168.1.1"));
//! assert!(!ips.matches("192.168.1.2"));
//!
//! let cidrs = CidrMatcher::new(["10.0.0.0/8".parse().unwrap()]);
//! assert!(cidrs.matches("10.1.2.3"));
//! assert!(!cidrs.matches("11.0.0.1"));
//! ```

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;

/// Literal IP address set
#[derive(Debug, Clone, Default)]
pub struct IpMatcher {
    ips: HashSet<IpAddr>,
}

impl IpMatcher {
    /// Build a matcher from parsed addresses
    pub fn new(ips: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            ips: ips.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    /// Create an empty matcher that never matches
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check whether `candidate` parses as an IP in the set
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if self.ips.is_empty() {
            return false;
        }
        candidate
            .parse::<IpAddr>()
            .is_ok_and(|ip| self.contains(ip))
    }

    /// Check a parsed address
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.ips.contains(&ip.to_canonical())
    }

    /// Number of distinct addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.ips.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

/// CIDR block list
///
/// Blocks are truncated to their network address on construction, so
/// `10.1.2.3/8` behaves exactly like `10.0.0.0/8`.
#[derive(Debug, Clone, Default)]
pub struct CidrMatcher {
    networks: Vec<IpNet>,
}

impl CidrMatcher {
    /// Build a matcher from parsed networks
    pub fn new(networks: impl IntoIterator<Item = IpNet>) -> Self {
        Self {
            networks: networks.into_iter().map(|net| net.trunc()).collect(),
        }
    }

    /// Create an empty matcher that never matches
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check whether `candidate` parses as an IP inside any block
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if self.networks.is_empty() {
            return false;
        }
        candidate
            .parse::<IpAddr>()
            .is_ok_and(|ip| self.contains(ip))
    }

    /// Check a parsed address
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// Number of network blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Whether the block list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
