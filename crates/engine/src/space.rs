//! The address space store — the single writer of truth for node state.
//!
//! Owns the node tree (folders, objects, variables) and every variable's
//! value/revision pair. The API is plain `&mut self`; callers that need
//! concurrent access wrap the store in a `Mutex`, which also gives the
//! mutate-then-notify ordering guarantee for free: the change hook runs
//! inside `write_value`, before the lock is released.
//!
//! Nodes are created during server initialization and live for the process
//! lifetime; only variable values mutate afterwards.

use rustc_hash::FxHashMap;

use railgrid_core::{NodeClass, NodeId, Role, Value};

use crate::error::SpaceError;
use crate::events::{ChangeHook, ValueChange};

/// URI of the base namespace at index 0.
pub const BASE_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Value state carried by variable nodes.
#[derive(Debug, Clone, PartialEq)]
struct VarCell {
    value: Value,
    writable: bool,
    /// Bumped on every successful write. Starts at 0.
    revision: u64,
}

/// A node in the address space tree.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    class: NodeClass,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Present iff `class == Variable`.
    cell: Option<VarCell>,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> NodeClass {
        self.class
    }

    /// Parent id; `None` only for the root.
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The authoritative node graph and value store.
pub struct AddressSpace {
    /// Registered namespace URIs; position is the namespace index.
    namespaces: Vec<String>,
    nodes: FxHashMap<NodeId, Node>,
    root: NodeId,
    /// Observer invoked on every successful write, before the call returns.
    hook: Option<ChangeHook>,
}

impl AddressSpace {
    /// Create an empty space containing only the implicit `Objects` root.
    pub fn new() -> Self {
        let root = NodeId::name(0, "Objects");
        let mut nodes = FxHashMap::default();
        nodes.insert(
            root.clone(),
            Node {
                id: root.clone(),
                name: "Objects".to_string(),
                class: NodeClass::Folder,
                parent: None,
                children: Vec::new(),
                cell: None,
            },
        );
        Self {
            namespaces: vec![BASE_NAMESPACE_URI.to_string()],
            nodes,
            root,
            hook: None,
        }
    }

    /// Id of the implicit root node.
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Register a namespace URI, returning its index.
    ///
    /// Indices are assigned once and never change; registering an already
    /// known URI returns the existing index.
    pub fn register_namespace(&mut self, uri: &str) -> u16 {
        if let Some(idx) = self.namespace_index(uri) {
            return idx;
        }
        self.namespaces.push(uri.to_string());
        (self.namespaces.len() - 1) as u16
    }

    /// Index of a registered URI, if any.
    pub fn namespace_index(&self, uri: &str) -> Option<u16> {
        self.namespaces.iter().position(|u| u == uri).map(|i| i as u16)
    }

    /// URI registered at an index, if any.
    pub fn namespace_uri(&self, idx: u16) -> Option<&str> {
        self.namespaces.get(idx as usize).map(String::as_str)
    }

    /// Install the change observer. At most one; the last call wins.
    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.hook = Some(hook);
    }

    /// Create a folder under the root with a string-keyed id.
    pub fn add_folder(&mut self, ns: u16, name: &str) -> Result<NodeId, SpaceError> {
        let id = NodeId::name(ns, name);
        let parent = self.root.clone();
        self.insert(parent, id.clone(), name, NodeClass::Folder, None)?;
        Ok(id)
    }

    /// Create an object node under `parent`.
    pub fn add_object(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        name: &str,
    ) -> Result<NodeId, SpaceError> {
        self.insert(parent.clone(), id.clone(), name, NodeClass::Object, None)?;
        Ok(id)
    }

    /// Create a variable node under `parent` with an initial value.
    pub fn add_variable(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        name: &str,
        initial: Value,
        writable: bool,
    ) -> Result<NodeId, SpaceError> {
        let cell = VarCell { value: initial, writable, revision: 0 };
        self.insert(parent.clone(), id.clone(), name, NodeClass::Variable, Some(cell))?;
        Ok(id)
    }

    fn insert(
        &mut self,
        parent: NodeId,
        id: NodeId,
        name: &str,
        class: NodeClass,
        cell: Option<VarCell>,
    ) -> Result<(), SpaceError> {
        if self.nodes.contains_key(&id) {
            return Err(SpaceError::DuplicateId(id));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(SpaceError::ParentNotFound(parent));
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id.clone());
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id,
                name: name.to_string(),
                class,
                parent: Some(parent),
                children: Vec::new(),
                cell,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Current value of a variable node.
    pub fn read_value(&self, id: &NodeId) -> Result<Value, SpaceError> {
        self.var_cell(id).map(|cell| cell.value)
    }

    /// Current revision counter of a variable node.
    pub fn revision(&self, id: &NodeId) -> Result<u64, SpaceError> {
        self.var_cell(id).map(|cell| cell.revision)
    }

    /// Whether a variable node accepts writes.
    pub fn is_writable(&self, id: &NodeId) -> Result<bool, SpaceError> {
        self.var_cell(id).map(|cell| cell.writable)
    }

    /// Flip a variable's writability flag. Administrative, init-time only.
    pub fn set_writable(&mut self, id: &NodeId, writable: bool) -> Result<(), SpaceError> {
        match self.nodes.get_mut(id).and_then(|n| n.cell.as_mut()) {
            Some(cell) => {
                cell.writable = writable;
                Ok(())
            }
            None => Err(SpaceError::NodeNotFound(id.clone())),
        }
    }

    /// Write a variable, enforcing writability and the requester's role.
    ///
    /// On success the value is replaced, the revision bumped, and the
    /// change hook invoked, in that order, before this call returns. A
    /// failed write leaves value and revision untouched.
    ///
    /// Returns the new revision.
    pub fn write_value(
        &mut self,
        id: &NodeId,
        value: Value,
        role: Role,
    ) -> Result<u64, SpaceError> {
        let change = {
            let cell = match self.nodes.get_mut(id).and_then(|n| n.cell.as_mut()) {
                Some(cell) => cell,
                None => return Err(SpaceError::NodeNotFound(id.clone())),
            };
            if !cell.writable {
                return Err(SpaceError::NotWritable(id.clone()));
            }
            if !role.can_write() {
                return Err(SpaceError::NotAuthorized { node: id.clone(), role });
            }
            let old = cell.value;
            cell.value = value;
            cell.revision += 1;
            ValueChange {
                node: id.clone(),
                old,
                new: value,
                revision: cell.revision,
            }
        };
        if let Some(hook) = self.hook.as_mut() {
            hook(&change);
        }
        Ok(change.revision)
    }

    fn var_cell(&self, id: &NodeId) -> Result<&VarCell, SpaceError> {
        self.nodes
            .get(id)
            .and_then(|n| n.cell.as_ref())
            .ok_or_else(|| SpaceError::NodeNotFound(id.clone()))
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeCollector;

    fn space_with_var(writable: bool) -> (AddressSpace, NodeId) {
        let mut space = AddressSpace::new();
        let ns = space.register_namespace("http://example.org/test");
        let folder = space.add_folder(ns, "Plant").unwrap();
        let var = space
            .add_variable(&folder, NodeId::numeric(ns, 100), "Speed", Value::Int(0), writable)
            .unwrap();
        (space, var)
    }

    #[test]
    fn test_namespace_registration_idempotent() {
        let mut space = AddressSpace::new();
        let a = space.register_namespace("http://railwaycorp.eu");
        let b = space.register_namespace("http://railwaycorp.eu");
        assert_eq!(a, b);
        assert_eq!(space.namespace_uri(a), Some("http://railwaycorp.eu"));
        assert_eq!(space.namespace_index(BASE_NAMESPACE_URI), Some(0));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut space = AddressSpace::new();
        let ns = space.register_namespace("http://example.org/test");
        let folder = space.add_folder(ns, "Plant").unwrap();
        space
            .add_object(&folder, NodeId::numeric(ns, 1), "A")
            .unwrap();
        let err = space
            .add_object(&folder, NodeId::numeric(ns, 1), "B")
            .unwrap_err();
        assert_eq!(err, SpaceError::DuplicateId(NodeId::numeric(ns, 1)));
    }

    #[test]
    fn test_parent_not_found() {
        let mut space = AddressSpace::new();
        let ns = space.register_namespace("http://example.org/test");
        let ghost = NodeId::numeric(ns, 999);
        let err = space
            .add_variable(&ghost, NodeId::numeric(ns, 1), "V", Value::Int(0), true)
            .unwrap_err();
        assert_eq!(err, SpaceError::ParentNotFound(ghost));
    }

    #[test]
    fn test_tree_links() {
        let mut space = AddressSpace::new();
        let ns = space.register_namespace("http://example.org/test");
        let folder = space.add_folder(ns, "Plant").unwrap();
        let obj = space
            .add_object(&folder, NodeId::numeric(ns, 10), "Motor")
            .unwrap();

        let node = space.node(&obj).unwrap();
        assert_eq!(node.class(), NodeClass::Object);
        assert_eq!(node.parent(), Some(&folder));
        assert_eq!(space.node(&folder).unwrap().children(), &[obj]);
        assert_eq!(
            space.node(&folder).unwrap().parent(),
            Some(space.root_id())
        );
    }

    #[test]
    fn test_read_write_round() {
        let (mut space, var) = space_with_var(true);
        assert_eq!(space.read_value(&var).unwrap(), Value::Int(0));

        let rev = space.write_value(&var, Value::Int(42), Role::Operator).unwrap();
        assert_eq!(rev, 1);
        assert_eq!(space.read_value(&var).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_revision_strictly_increasing() {
        let (mut space, var) = space_with_var(true);
        let mut last = 0;
        for n in 1..=5 {
            let rev = space
                .write_value(&var, Value::Int(n), Role::Operator)
                .unwrap();
            assert_eq!(rev, last + 1);
            last = rev;
        }
        assert_eq!(space.revision(&var).unwrap(), 5);
    }

    #[test]
    fn test_read_missing_node() {
        let space = AddressSpace::new();
        let ghost = NodeId::numeric(1, 1);
        assert_eq!(
            space.read_value(&ghost).unwrap_err(),
            SpaceError::NodeNotFound(ghost)
        );
    }

    #[test]
    fn test_read_folder_is_node_not_found() {
        let mut space = AddressSpace::new();
        let ns = space.register_namespace("http://example.org/test");
        let folder = space.add_folder(ns, "Plant").unwrap();
        // Folders carry no value.
        assert_eq!(
            space.read_value(&folder).unwrap_err(),
            SpaceError::NodeNotFound(folder)
        );
    }

    #[test]
    fn test_not_writable_leaves_state() {
        let (mut space, var) = space_with_var(false);
        let err = space
            .write_value(&var, Value::Int(9), Role::Operator)
            .unwrap_err();
        assert_eq!(err, SpaceError::NotWritable(var.clone()));
        assert_eq!(space.read_value(&var).unwrap(), Value::Int(0));
        assert_eq!(space.revision(&var).unwrap(), 0);
    }

    #[test]
    fn test_unauthorized_role_leaves_state() {
        let (mut space, var) = space_with_var(true);
        let err = space
            .write_value(&var, Value::Int(9), Role::Observer)
            .unwrap_err();
        assert_eq!(
            err,
            SpaceError::NotAuthorized { node: var.clone(), role: Role::Observer }
        );
        assert_eq!(space.read_value(&var).unwrap(), Value::Int(0));
        assert_eq!(space.revision(&var).unwrap(), 0);
    }

    #[test]
    fn test_set_writable_round_trip() {
        let (mut space, var) = space_with_var(false);
        assert!(!space.is_writable(&var).unwrap());
        space.set_writable(&var, true).unwrap();
        assert!(space.is_writable(&var).unwrap());
        space.write_value(&var, Value::Int(1), Role::Operator).unwrap();
    }

    #[test]
    fn test_hook_sees_change_before_return() {
        let (mut space, var) = space_with_var(true);
        let collector = ChangeCollector::new();
        space.set_change_hook(collector.hook());

        space.write_value(&var, Value::Int(1), Role::Operator).unwrap();
        space.write_value(&var, Value::Int(7), Role::Operator).unwrap();

        let changes = collector.take();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].old, Value::Int(0));
        assert_eq!(changes[0].new, Value::Int(1));
        assert_eq!(changes[0].revision, 1);
        assert_eq!(changes[1].old, Value::Int(1));
        assert_eq!(changes[1].new, Value::Int(7));
        assert_eq!(changes[1].revision, 2);
    }

    #[test]
    fn test_failed_write_emits_nothing() {
        let (mut space, var) = space_with_var(false);
        let collector = ChangeCollector::new();
        space.set_change_hook(collector.hook());

        let _ = space.write_value(&var, Value::Int(1), Role::Operator);
        let _ = space.write_value(&var, Value::Int(1), Role::Observer);
        assert!(collector.is_empty());
    }
}
