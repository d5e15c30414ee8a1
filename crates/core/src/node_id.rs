//! Node identity in the server address space.
//!
//! A `NodeId` uniquely identifies a node across all namespaces. It combines
//! a namespace index with either a numeric or a string key, matching the
//! two id forms clients address nodes by.

use serde::{Deserialize, Serialize};

/// The key half of a node id: numeric or string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    Numeric(u32),
    Name(String),
}

/// Unique identifier for a node in the address space.
///
/// Identifiers are assigned once at startup and never change. The full id
/// (namespace + key) is the map key in the store, so uniqueness within a
/// namespace falls out of map semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index the key is scoped to.
    pub ns: u16,
    /// Numeric or string key.
    pub key: NodeKey,
}

impl NodeId {
    /// Create a numeric-keyed id.
    #[inline]
    pub fn numeric(ns: u16, key: u32) -> Self {
        Self { ns, key: NodeKey::Numeric(key) }
    }

    /// Create a string-keyed id.
    #[inline]
    pub fn name(ns: u16, key: impl Into<String>) -> Self {
        Self { ns, key: NodeKey::Name(key.into()) }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            NodeKey::Numeric(n) => write!(f, "ns={};i={}", self.ns, n),
            NodeKey::Name(s) => write!(f, "ns={};s={}", self.ns, s),
        }
    }
}

/// What kind of node an id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    Folder,
    Object,
    Variable,
}

impl std::fmt::Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder => write!(f, "Folder"),
            Self::Object => write!(f, "Object"),
            Self::Variable => write!(f, "Variable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_equality() {
        let a = NodeId::numeric(2, 2003);
        let b = NodeId::numeric(2, 2003);
        let c = NodeId::numeric(1, 2003);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, NodeId::name(2, "2003"));
    }

    #[test]
    fn test_node_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(NodeId::numeric(2, 2000));
        set.insert(NodeId::numeric(2, 2000)); // duplicate
        set.insert(NodeId::name(2, "Railway"));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", NodeId::numeric(2, 2003)), "ns=2;i=2003");
        assert_eq!(format!("{}", NodeId::name(0, "Objects")), "ns=0;s=Objects");
    }
}
