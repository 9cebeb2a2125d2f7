//! The instance-data tree under validation.
//!
//! Nodes live in an arena owned by [`DataTree`] and are addressed by
//! [`NodeId`]. Each node points at its (shared, never owned) schema node and
//! keeps its children as an ordered vector of handles, so appending is O(1)
//! and iteration order is stable. Removed slots are never reused, so a stale
//! `NodeId` can never alias a newer node.

mod value;

use std::sync::Arc;

pub use value::{DataValue, ValueError, ValueItem};

use crate::path::DataPath;
use crate::schema::{NodeKind, Schema, SchemaId, SchemaNode};
use crate::validity::{initial_validity, Validity};

/// Handle of a node within its [`DataTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Builds a handle from a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind-specific content of a data node.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Containers, lists, and operations; content lives in the children.
    Inner,
    Leaf(DataValue),
    /// An anydata/anyxml blob.
    Any(serde_json::Value),
}

/// A single instance in the tree.
#[derive(Debug, Clone)]
pub struct DataNode {
    schema: SchemaId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    validity: Validity,
    payload: Payload,
    leafref_target: Option<NodeId>,
}

impl DataNode {
    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn value(&self) -> Option<&DataValue> {
        match &self.payload {
            Payload::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// The instance a resolved leafref points at.
    pub fn leafref_target(&self) -> Option<NodeId> {
        self.leafref_target
    }
}

/// Errors raised while building or navigating a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node #{} does not exist", .0.index())]
    UnknownNode(NodeId),

    #[error("'{child}' cannot be a child of '{parent}'")]
    InvalidParent { parent: String, child: String },

    #[error("'{0}' is not instantiable")]
    NotInstantiable(String),

    #[error("payload does not match the kind of '{0}'")]
    PayloadMismatch(String),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl From<TreeError> for crate::error::Error {
    fn from(error: TreeError) -> Self {
        crate::error::Error::Internal(error.to_string())
    }
}

/// An instance-data tree built against a shared schema.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use yangcheck::data::DataTree;
/// use yangcheck::schema::{Module, NodeDef, Schema, TypeDef, YangVersion};
///
/// let ex = Module::new("ex", YangVersion::V1_1).into_shared();
/// let mut b = Schema::builder();
/// let sys = b.add(None, &ex, NodeDef::container("system"));
/// let host = b.add(Some(sys), &ex, NodeDef::leaf("hostname", Arc::new(TypeDef::string())));
/// let schema = Arc::new(b.build().unwrap());
///
/// let mut tree = DataTree::new(Arc::clone(&schema));
/// let system = tree.insert_inner(None, sys).unwrap();
/// let hostname = tree.insert_leaf(Some(system), host, "edge-1").unwrap();
///
/// assert_eq!(tree.path(hostname).unwrap().to_string(), "/ex:system/hostname");
/// assert_eq!(tree.value(hostname).unwrap().canonical, "edge-1");
/// ```
#[derive(Debug, Clone)]
pub struct DataTree {
    schema: Arc<Schema>,
    nodes: Vec<Option<DataNode>>,
    roots: Vec<NodeId>,
}

impl DataTree {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&DataNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Returns the node for `id`, failing if it was removed or never existed.
    pub fn node(&self, id: NodeId) -> Result<&DataNode, TreeError> {
        self.get(id).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DataNode, TreeError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::UnknownNode(id))
    }

    /// The schema node of an instance.
    pub fn schema_node(&self, id: NodeId) -> Result<&SchemaNode, TreeError> {
        Ok(self.schema.node(self.node(id)?.schema))
    }

    pub fn value(&self, id: NodeId) -> Option<&DataValue> {
        self.get(id).and_then(DataNode::value)
    }

    pub fn validity(&self, id: NodeId) -> Option<Validity> {
        self.get(id).map(DataNode::validity)
    }

    /// Top-level instances, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of `parent`, or the top-level instances for `None`.
    pub fn children(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(p) => self.get(p).map_or(&[], |n| n.children.as_slice()),
            None => &self.roots,
        }
    }

    /// All instances sharing the parent of `id`, `id` included.
    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(node) => self.children(node.parent),
            None => &[],
        }
    }

    /// The instance right before `id` among its siblings.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.siblings(id);
        let position = siblings.iter().position(|s| *s == id)?;
        position.checked_sub(1).map(|p| siblings[p])
    }

    /// Instances of `schema` directly under `parent`, in order.
    pub fn instances_of(&self, parent: Option<NodeId>, schema: SchemaId) -> Vec<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| self.get(*c).is_some_and(|n| n.schema == schema))
            .collect()
    }

    /// Iterates the data ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).and_then(|n| n.parent), move |p| {
            self.get(*p).and_then(|n| n.parent)
        })
    }

    /// Every live node, children before their parent.
    pub fn post_order(&self) -> Vec<NodeId> {
        fn visit(tree: &DataTree, id: NodeId, out: &mut Vec<NodeId>) {
            for child in tree.children(Some(id)) {
                visit(tree, *child, out);
            }
            out.push(id);
        }

        let mut out = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            visit(self, *root, &mut out);
        }
        out
    }

    /// Attaches a new instance of `schema` under `parent`.
    ///
    /// The node's validity is computed here, once, from its schema node.
    ///
    /// # Errors
    ///
    /// Fails if `schema` cannot be instantiated under `parent`, or if the
    /// payload does not suit the schema node's kind.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        schema: SchemaId,
        payload: Payload,
    ) -> Result<NodeId, TreeError> {
        let schema_node = self.schema.node(schema);
        let kind = schema_node.kind();
        if !kind.is_instantiable() {
            return Err(TreeError::NotInstantiable(schema_node.name().to_string()));
        }

        let expected_parent = self.schema.data_parent(schema);
        let actual_parent = match parent {
            Some(p) => Some(self.node(p)?.schema),
            None => None,
        };
        if expected_parent != actual_parent {
            return Err(TreeError::InvalidParent {
                parent: actual_parent.map_or("/".to_string(), |p| {
                    self.schema.node(p).name().to_string()
                }),
                child: schema_node.name().to_string(),
            });
        }

        let payload_fits = match (&payload, kind) {
            (Payload::Leaf(_), NodeKind::Leaf | NodeKind::LeafList) => true,
            (Payload::Any(_), NodeKind::AnyData | NodeKind::AnyXml) => true,
            (Payload::Inner, k) => !matches!(
                k,
                NodeKind::Leaf | NodeKind::LeafList | NodeKind::AnyData | NodeKind::AnyXml
            ),
            _ => false,
        };
        if !payload_fits {
            return Err(TreeError::PayloadMismatch(schema_node.name().to_string()));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(DataNode {
            schema,
            parent,
            children: Vec::new(),
            validity: initial_validity(&self.schema, schema),
            payload,
            leafref_target: None,
        }));
        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Attaches a container, list entry or operation instance.
    pub fn insert_inner(
        &mut self,
        parent: Option<NodeId>,
        schema: SchemaId,
    ) -> Result<NodeId, TreeError> {
        self.insert(parent, schema, Payload::Inner)
    }

    /// Parses `text` with the leaf's type and attaches the leaf.
    pub fn insert_leaf(
        &mut self,
        parent: Option<NodeId>,
        schema: SchemaId,
        text: &str,
    ) -> Result<NodeId, TreeError> {
        let node = self.schema.node(schema);
        let ty = node
            .leaf_type()
            .ok_or_else(|| TreeError::PayloadMismatch(node.name().to_string()))?;
        let value = DataValue::parse(ty, text)?;
        self.insert(parent, schema, Payload::Leaf(value))
    }

    /// Attaches an anydata/anyxml blob.
    pub fn insert_any(
        &mut self,
        parent: Option<NodeId>,
        schema: SchemaId,
        value: serde_json::Value,
    ) -> Result<NodeId, TreeError> {
        self.insert(parent, schema, Payload::Any(value))
    }

    /// Detaches `id` and drops its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        match parent {
            Some(p) => self.node_mut(p)?.children.retain(|c| *c != id),
            None => self.roots.retain(|c| *c != id),
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Resets the validity of `id` to its initial mask and forgets any
    /// resolved leafref target, so the node is checked again from scratch.
    pub fn revalidate(&mut self, id: NodeId) -> Result<(), TreeError> {
        let validity = initial_validity(&self.schema, self.node(id)?.schema);
        let node = self.node_mut(id)?;
        node.validity = validity;
        node.leafref_target = None;
        Ok(())
    }

    /// Clears `bits` of `id`'s validity.
    pub(crate) fn clear_validity(&mut self, id: NodeId, bits: Validity) -> Result<(), TreeError> {
        self.node_mut(id)?.validity.remove(bits);
        Ok(())
    }

    pub(crate) fn set_leafref_target(
        &mut self,
        id: NodeId,
        target: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.node_mut(id)?.leafref_target = target;
        Ok(())
    }

    /// Builds the instance path of `id`.
    ///
    /// The module name is printed on the first step and wherever it changes.
    /// List entries are identified by their keys (or position when keyless)
    /// and leaf-list entries by their value.
    pub fn path(&self, id: NodeId) -> Result<DataPath, TreeError> {
        let mut chain: Vec<NodeId> = self.ancestors(id).collect();
        chain.reverse();
        chain.push(id);

        let mut path = DataPath::root();
        let mut previous_module: Option<&str> = None;
        for node_id in chain {
            let node = self.node(node_id)?;
            let schema = self.schema.node(node.schema);
            let module = schema.module().name();
            let qualifier = (previous_module != Some(module)).then_some(module);
            path = path.push_node(qualifier, schema.name());
            previous_module = Some(module);

            match schema.kind() {
                NodeKind::List if !schema.keys().is_empty() => {
                    for key in schema.keys() {
                        let value = node
                            .children
                            .iter()
                            .filter_map(|c| self.get(*c))
                            .find(|c| c.schema == *key)
                            .and_then(DataNode::value);
                        if let Some(value) = value {
                            path = path.push_key(self.schema.node(*key).name(), &value.canonical);
                        }
                    }
                }
                NodeKind::List => {
                    let position = self
                        .instances_of(node.parent, node.schema)
                        .iter()
                        .position(|s| *s == node_id)
                        .map_or(1, |p| p + 1);
                    path = path.push_position(position);
                }
                NodeKind::LeafList => {
                    if let Some(value) = node.value() {
                        path = path.push_value(&value.canonical);
                    }
                }
                _ => {}
            }
        }
        Ok(path)
    }

    /// Finds the instance addressed by `path`.
    ///
    /// Steps match by node name (module qualifiers are ignored); key, value
    /// and position predicates narrow each step. Returns the first match.
    pub fn find(&self, path: &DataPath) -> Option<NodeId> {
        use crate::path::PathSegment;

        let mut current: Vec<NodeId> = Vec::new();
        let mut parent: Option<Option<NodeId>> = Some(None);
        let mut segments = path.segments().peekable();

        while let Some(segment) = segments.next() {
            let PathSegment::Node { name, .. } = segment else {
                return None;
            };
            let scope = match parent {
                Some(p) => p,
                None => Some(*current.first()?),
            };
            let mut candidates: Vec<NodeId> = self
                .children(scope)
                .iter()
                .copied()
                .filter(|c| self.schema_node(*c).is_ok_and(|s| s.name() == name))
                .collect();

            while let Some(predicate) = segments.next_if(|s| !s.is_node()) {
                candidates = match predicate {
                    PathSegment::Key { name, value } => candidates
                        .into_iter()
                        .filter(|c| {
                            self.children(Some(*c)).iter().any(|k| {
                                self.schema_node(*k).is_ok_and(|s| s.name() == name)
                                    && self.value(*k).is_some_and(|v| &v.canonical == value)
                            })
                        })
                        .collect(),
                    PathSegment::Value(value) => candidates
                        .into_iter()
                        .filter(|c| self.value(*c).is_some_and(|v| &v.canonical == value))
                        .collect(),
                    PathSegment::Position(pos) => pos
                        .checked_sub(1)
                        .and_then(|i| candidates.get(i).copied())
                        .into_iter()
                        .collect(),
                    PathSegment::Node { .. } => unreachable!("filtered by next_if"),
                };
            }

            current = candidates;
            parent = None;
        }

        current.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, NodeDef, TypeDef, YangVersion};

    struct Fixture {
        schema: Arc<Schema>,
        ifaces: SchemaId,
        iface: SchemaId,
        name: SchemaId,
        mtu: SchemaId,
        tags: SchemaId,
    }

    fn fixture() -> Fixture {
        let ex = Module::new("ex", YangVersion::V1_1).into_shared();
        let mut b = Schema::builder();
        let ifaces = b.add(None, &ex, NodeDef::container("interfaces"));
        let iface = b.add(Some(ifaces), &ex, NodeDef::list("iface", &["name"]));
        let name = b.add(Some(iface), &ex, NodeDef::leaf("name", Arc::new(TypeDef::string())));
        let mtu = b.add(Some(iface), &ex, NodeDef::leaf("mtu", Arc::new(TypeDef::uint())));
        let tags = b.add(
            Some(iface),
            &ex,
            NodeDef::leaf_list("tag", Arc::new(TypeDef::string())),
        );
        Fixture {
            schema: Arc::new(b.build().unwrap()),
            ifaces,
            iface,
            name,
            mtu,
            tags,
        }
    }

    #[test]
    fn test_insert_sets_initial_validity() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        let entry = tree.insert_inner(Some(top), f.iface).unwrap();
        assert_eq!(
            tree.validity(entry),
            Some(Validity::MAND | Validity::DUP)
        );
    }

    #[test]
    fn test_insert_rejects_wrong_parent_and_payload() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        assert!(matches!(
            tree.insert_inner(None, f.iface),
            Err(TreeError::InvalidParent { .. })
        ));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        assert!(matches!(
            tree.insert_inner(Some(top), f.name),
            Err(TreeError::InvalidParent { .. })
        ));
        let entry = tree.insert_inner(Some(top), f.iface).unwrap();
        assert!(matches!(
            tree.insert_inner(Some(entry), f.name),
            Err(TreeError::PayloadMismatch(_))
        ));
        assert!(matches!(
            tree.insert_leaf(Some(entry), f.mtu, "big"),
            Err(TreeError::Value(_))
        ));
    }

    #[test]
    fn test_paths_and_find() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        let entry = tree.insert_inner(Some(top), f.iface).unwrap();
        tree.insert_leaf(Some(entry), f.name, "eth0").unwrap();
        let mtu = tree.insert_leaf(Some(entry), f.mtu, "1500").unwrap();
        let tag = tree.insert_leaf(Some(entry), f.tags, "uplink").unwrap();

        let mtu_path = tree.path(mtu).unwrap();
        assert_eq!(mtu_path.to_string(), "/ex:interfaces/iface[name='eth0']/mtu");
        assert_eq!(
            tree.path(tag).unwrap().to_string(),
            "/ex:interfaces/iface[name='eth0']/tag[.='uplink']"
        );
        assert_eq!(tree.find(&mtu_path), Some(mtu));

        let missing: DataPath = "/ex:interfaces/iface[name='eth1']/mtu".parse().unwrap();
        assert_eq!(tree.find(&missing), None);
    }

    #[test]
    fn test_remove_drops_subtree_and_keeps_order() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        let a = tree.insert_inner(Some(top), f.iface).unwrap();
        let a_name = tree.insert_leaf(Some(a), f.name, "a").unwrap();
        let b = tree.insert_inner(Some(top), f.iface).unwrap();
        let c = tree.insert_inner(Some(top), f.iface).unwrap();

        tree.remove(a).unwrap();
        assert!(!tree.contains(a));
        assert!(!tree.contains(a_name));
        assert_eq!(tree.children(Some(top)), &[b, c]);
        assert_eq!(tree.previous_sibling(c), Some(b));
        assert_eq!(tree.previous_sibling(b), None);
        assert!(matches!(tree.remove(a), Err(TreeError::UnknownNode(_))));
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        let entry = tree.insert_inner(Some(top), f.iface).unwrap();
        let name = tree.insert_leaf(Some(entry), f.name, "x").unwrap();
        assert_eq!(tree.post_order(), vec![name, entry, top]);
    }

    #[test]
    fn test_revalidate_restores_bits() {
        let f = fixture();
        let mut tree = DataTree::new(Arc::clone(&f.schema));
        let top = tree.insert_inner(None, f.ifaces).unwrap();
        tree.clear_validity(top, Validity::MAND).unwrap();
        assert_eq!(tree.validity(top), Some(Validity::OK));
        tree.revalidate(top).unwrap();
        assert_eq!(tree.validity(top), Some(Validity::MAND));
    }
}
