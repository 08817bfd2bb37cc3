//! Node and supernode identifiers.
//!
//! Original nodes are assigned a dense `NodeId` at load time (the position
//! of the node in the input file's iteration order). Supernodes reuse
//! `NodeId` — a supernode's identity is always the id of one of its member
//! nodes (the "root"), per the reconstruction rule in the data model.

use std::fmt;

/// Dense identifier for an original node, also used for supernode roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Builds a `NodeId` from a raw dense index.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(index: u64) -> Self { Self(index) }

    /// Returns the underlying dense index.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_get() {
        let id = NodeId::new(42);
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn orders_by_underlying_value() {
        assert!(NodeId::new(1) < NodeId::new(2));
    }
}
