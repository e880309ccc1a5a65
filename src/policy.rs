//! Decision traits consumed by the networking layer
//!
//! Listeners hold something that implements [`Admission`]; routers hold
//! something that implements [`Bypass`]. Both are implemented by
//! [`PolicyEngine`], by `Arc<T>` and by `Option<T>`. A `None` policy always
//! answers `false`: it never admits and never bypasses.

use std::sync::Arc;

use crate::rules::PolicyEngine;

/// Inbound connection gate
pub trait Admission: Send + Sync {
    /// Whether a client at `addr` may connect
    fn admit(&self, addr: &str) -> bool;
}

/// Outbound hop exclusion
pub trait Bypass: Send + Sync {
    /// Whether traffic to `addr` skips this hop
    fn contains(&self, addr: &str) -> bool;
}

impl Admission for PolicyEngine {
    fn admit(&self, addr: &str) -> bool {
        self.decide(addr)
    }
}

impl Bypass for PolicyEngine {
    fn contains(&self, addr: &str) -> bool {
        self.decide(addr)
    }
}

impl<T: Admission + ?Sized> Admission for Arc<T> {
    fn admit(&self, addr: &str) -> bool {
        (**self).admit(addr)
    }
}

impl<T: Bypass + ?Sized> Bypass for Arc<T> {
    fn contains(&self, addr: &str) -> bool {
        (**self).contains(addr)
    }
}

impl<T: Admission> Admission for Option<T> {
    fn admit(&self, addr: &str) -> bool {
        self.as_ref().is_some_and(|p| p.admit(addr))
    }
}

impl<T: Bypass> Bypass for Option<T> {
    fn contains(&self, addr: &str) -> bool {
        self.as_ref().is_some_and(|p| p.contains(addr))
    }
}
