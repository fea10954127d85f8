//! Process-unique resource identities

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a cacheable source object (path, stroke, image, font)
///
/// Identities are handed out from a global counter when the object is built.
/// Two paths with identical geometry still have distinct identities; clones of
/// one path share its identity because the geometry cannot change after
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value, mostly useful for logging
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }
}
