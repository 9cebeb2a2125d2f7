//! The compiled schema tree.
//!
//! Schema nodes live in an arena owned by [`Schema`] and are addressed by
//! [`SchemaId`]. Once built, a schema is immutable (only feature states can
//! change) and is shared read-only by every data tree built against it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yangcheck::schema::{Module, NodeDef, Schema, TypeDef, YangVersion};
//!
//! let ex = Module::new("ex", YangVersion::V1_1).into_shared();
//! let mut builder = Schema::builder();
//! let ifaces = builder.add(None, &ex, NodeDef::container("interfaces"));
//! let iface = builder.add(Some(ifaces), &ex, NodeDef::list("iface", &["name"]).unique("ip port"));
//! builder.add(Some(iface), &ex, NodeDef::leaf("name", Arc::new(TypeDef::string())));
//! builder.add(Some(iface), &ex, NodeDef::leaf("ip", Arc::new(TypeDef::string())));
//! builder.add(Some(iface), &ex, NodeDef::leaf("port", Arc::new(TypeDef::uint())));
//! let schema = builder.build().unwrap();
//!
//! assert_eq!(schema.find_path("/interfaces/iface"), Some(iface));
//! assert_eq!(schema.node(iface).uniques()[0].expr, "ip port");
//! ```

mod builder;
pub mod extension;
mod module;
mod types;

use std::fmt;
use std::sync::Arc;

pub use builder::{NodeDef, SchemaBuilder};
pub use extension::{
    ExtensionPlugin, ExtensionRegistry, ExtensionScope, FnExtension, RegistryError,
};
pub use module::{Identity, IfFeature, Module, YangVersion};
pub use types::{BitEntry, EnumEntry, Restriction, RestrictionKind, TypeDef, TypeKind};

/// Index of a node within its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

/// The statement a schema node was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Container,
    Leaf,
    LeafList,
    List,
    Choice,
    Case,
    Uses,
    AnyData,
    AnyXml,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

impl NodeKind {
    /// True for kinds that have instances in a data tree.
    pub fn is_instantiable(self) -> bool {
        !matches!(
            self,
            NodeKind::Choice | NodeKind::Case | NodeKind::Uses | NodeKind::Input | NodeKind::Output
        )
    }

    /// True for RPCs, actions and notifications.
    pub fn is_operation(self) -> bool {
        matches!(self, NodeKind::Rpc | NodeKind::Action | NodeKind::Notification)
    }

    /// True for kinds that may have several instances under one parent.
    pub fn is_multi_instance(self) -> bool {
        matches!(self, NodeKind::List | NodeKind::LeafList)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderedBy {
    #[default]
    System,
    User,
}

/// Whether validating an instance must call extension plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtValidation {
    #[default]
    None,
    /// Plugins are bound to the node or its type.
    Node,
    /// Some plugin asked to see every change below the node.
    Subtree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Must {
    pub expr: String,
    pub error_message: Option<String>,
}

impl Must {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            error_message: None,
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct When {
    pub expr: String,
}

impl When {
    pub fn new(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }
}

/// A compiled `unique` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unique {
    /// The statement argument as written, e.g. `"ip port"`.
    pub expr: String,
    /// Each descendant path, as node names relative to the list.
    pub paths: Vec<Vec<String>>,
    /// The leaf each path resolves to.
    pub leaves: Vec<SchemaId>,
}

/// Kind-specific part of a schema node.
#[derive(Debug, Clone)]
pub enum NodeDetail {
    Container {
        presence: bool,
    },
    Leaf {
        ty: Arc<TypeDef>,
        default: Option<String>,
    },
    LeafList {
        ty: Arc<TypeDef>,
        defaults: Vec<String>,
        min_elements: u32,
        max_elements: Option<u32>,
        ordered_by: OrderedBy,
    },
    List {
        keys: Vec<SchemaId>,
        uniques: Vec<Unique>,
        min_elements: u32,
        max_elements: Option<u32>,
        ordered_by: OrderedBy,
    },
    Choice {
        default_case: Option<SchemaId>,
    },
    Case,
    Uses,
    AnyData,
    AnyXml,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

impl NodeDetail {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeDetail::Container { .. } => NodeKind::Container,
            NodeDetail::Leaf { .. } => NodeKind::Leaf,
            NodeDetail::LeafList { .. } => NodeKind::LeafList,
            NodeDetail::List { .. } => NodeKind::List,
            NodeDetail::Choice { .. } => NodeKind::Choice,
            NodeDetail::Case => NodeKind::Case,
            NodeDetail::Uses => NodeKind::Uses,
            NodeDetail::AnyData => NodeKind::AnyData,
            NodeDetail::AnyXml => NodeKind::AnyXml,
            NodeDetail::Rpc => NodeKind::Rpc,
            NodeDetail::Action => NodeKind::Action,
            NodeDetail::Input => NodeKind::Input,
            NodeDetail::Output => NodeKind::Output,
            NodeDetail::Notification => NodeKind::Notification,
        }
    }
}

/// A single compiled schema node.
pub struct SchemaNode {
    pub(crate) id: SchemaId,
    pub(crate) parent: Option<SchemaId>,
    pub(crate) children: Vec<SchemaId>,
    pub(crate) name: String,
    pub(crate) module: Arc<Module>,
    pub(crate) config: bool,
    pub(crate) status: Status,
    pub(crate) mandatory: bool,
    pub(crate) if_features: Vec<IfFeature>,
    pub(crate) musts: Vec<Must>,
    pub(crate) when: Option<When>,
    pub(crate) extensions: Vec<Arc<dyn ExtensionPlugin>>,
    pub(crate) ext_validation: ExtValidation,
    pub(crate) detail: NodeDetail,
}

impl SchemaNode {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn kind(&self) -> NodeKind {
        self.detail.kind()
    }

    pub fn detail(&self) -> &NodeDetail {
        &self.detail
    }

    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    pub fn children(&self) -> &[SchemaId] {
        &self.children
    }

    /// Effective `config` value; nodes inside operations are never state data.
    pub fn is_config(&self) -> bool {
        self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn if_features(&self) -> &[IfFeature] {
        &self.if_features
    }

    pub fn musts(&self) -> &[Must] {
        &self.musts
    }

    pub fn when(&self) -> Option<&When> {
        self.when.as_ref()
    }

    pub fn extensions(&self) -> &[Arc<dyn ExtensionPlugin>] {
        &self.extensions
    }

    pub fn ext_validation(&self) -> ExtValidation {
        self.ext_validation
    }

    /// The type of a leaf or leaf-list.
    pub fn leaf_type(&self) -> Option<&Arc<TypeDef>> {
        match &self.detail {
            NodeDetail::Leaf { ty, .. } | NodeDetail::LeafList { ty, .. } => Some(ty),
            _ => None,
        }
    }

    /// The key leaves of a list, in declaration order.
    pub fn keys(&self) -> &[SchemaId] {
        match &self.detail {
            NodeDetail::List { keys, .. } => keys,
            _ => &[],
        }
    }

    /// The `unique` statements of a list.
    pub fn uniques(&self) -> &[Unique] {
        match &self.detail {
            NodeDetail::List { uniques, .. } => uniques,
            _ => &[],
        }
    }

    /// The default value of a leaf.
    pub fn default_value(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Leaf { default, .. } => default.as_deref(),
            _ => None,
        }
    }

    /// min-elements and max-elements of a list or leaf-list.
    pub fn cardinality(&self) -> Option<(u32, Option<u32>)> {
        match &self.detail {
            NodeDetail::List {
                min_elements,
                max_elements,
                ..
            }
            | NodeDetail::LeafList {
                min_elements,
                max_elements,
                ..
            } => Some((*min_elements, *max_elements)),
            _ => None,
        }
    }

    pub fn is_presence(&self) -> bool {
        matches!(self.detail, NodeDetail::Container { presence: true })
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("module", &self.module.name())
            .field("kind", &self.kind())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// An immutable, compiled schema tree.
#[derive(Debug)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
    roots: Vec<SchemaId>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different schema.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    /// Top-level schema nodes, in declaration order.
    pub fn roots(&self) -> &[SchemaId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates the schema ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: SchemaId) -> impl Iterator<Item = SchemaId> + '_ {
        std::iter::successors(self.node(id).parent, move |p| self.node(*p).parent)
    }

    /// The nearest instantiable ancestor, i.e. the schema of the data parent.
    pub fn data_parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.ancestors(id)
            .find(|a| self.node(*a).kind().is_instantiable())
    }

    /// The instantiable children of `parent` (top level for `None`), looking
    /// through choices, cases, uses, input and output, in declaration order.
    pub fn data_children(&self, parent: Option<SchemaId>) -> Vec<SchemaId> {
        let direct = match parent {
            Some(p) => self.node(p).children.as_slice(),
            None => self.roots.as_slice(),
        };
        let mut out = Vec::new();
        self.collect_data_children(direct, &mut out);
        out
    }

    fn collect_data_children(&self, ids: &[SchemaId], out: &mut Vec<SchemaId>) {
        for &id in ids {
            let node = self.node(id);
            if node.kind().is_instantiable() {
                out.push(id);
            } else {
                self.collect_data_children(&node.children, out);
            }
        }
    }

    /// Finds an instantiable child of `parent` by name (module prefixes ignored).
    pub fn find_data_child(&self, parent: Option<SchemaId>, name: &str) -> Option<SchemaId> {
        let name = strip_prefix(name);
        self.data_children(parent)
            .into_iter()
            .find(|c| self.node(*c).name == name)
    }

    /// Resolves a `/`-separated path of data node names from the top level.
    pub fn find_path(&self, path: &str) -> Option<SchemaId> {
        let mut current = None;
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = Some(self.find_data_child(current, step)?);
        }
        current
    }

    /// Returns the choice directly enclosing `id` and the case `id` belongs to.
    ///
    /// `uses` wrappers are looked through. A node placed directly under a
    /// choice is its own (implicit) case. Returns `None` when the nearest
    /// relevant ancestor is an instantiable node or the top level.
    pub fn choice_context(&self, id: SchemaId) -> Option<(SchemaId, SchemaId)> {
        let mut case = id;
        for ancestor in self.ancestors(id) {
            match self.node(ancestor).kind() {
                NodeKind::Uses => continue,
                NodeKind::Case => case = ancestor,
                NodeKind::Choice => return Some((ancestor, case)),
                _ => return None,
            }
        }
        None
    }

    /// The case of `choice` that `id` sits in, if `id` is below `choice`
    /// without crossing an instantiable node.
    pub fn case_within(&self, id: SchemaId, choice: SchemaId) -> Option<SchemaId> {
        let mut below = id;
        for ancestor in self.ancestors(id) {
            if ancestor == choice {
                return Some(below);
            }
            let kind = self.node(ancestor).kind();
            if kind.is_instantiable() {
                return None;
            }
            if kind != NodeKind::Uses {
                below = ancestor;
            }
        }
        None
    }

    /// The nearest RPC, action or notification at or above `id`.
    pub fn operation_of(&self, id: SchemaId) -> Option<SchemaId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|a| self.node(*a).kind().is_operation())
    }
}

/// Drops an optional `prefix:` from a node name.
pub(crate) fn strip_prefix(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Errors raised while building a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("'{child}' cannot be placed under '{parent}'")]
    InvalidParent { parent: String, child: String },

    #[error("list '{list}' has no key leaf '{key}'")]
    UnknownKey { list: String, key: String },

    #[error("configuration list '{0}' must declare keys")]
    MissingKeys(String),

    #[error("unique '{expr}' of list '{list}' does not name a descendant leaf")]
    UnknownUniqueLeaf { list: String, expr: String },

    #[error("choice '{choice}' has no case '{case}'")]
    UnknownCase { choice: String, case: String },

    #[error("'{0}' is config true under a config false parent")]
    ConfigTrueUnderFalse(String),

    #[error("module '{module}' declares no feature '{feature}'")]
    UnknownFeature { module: String, feature: String },

    #[error(transparent)]
    Extension(#[from] RegistryError),
}
