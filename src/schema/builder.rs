//! Schema construction.
//!
//! [`SchemaBuilder`] stands in for the schema compiler: nodes are added
//! parent-first as [`NodeDef`]s, and `build` resolves names (keys, unique
//! paths, default cases, extension plugins) into ids and computes inherited
//! flags.

use std::sync::Arc;

use super::{
    strip_prefix, ExtValidation, ExtensionPlugin, ExtensionRegistry, ExtensionScope, IfFeature,
    Module, Must, NodeDetail, NodeKind, OrderedBy, Schema, SchemaError, SchemaId, SchemaNode,
    Status, TypeDef, Unique, When,
};

/// Kind-specific data of a definition, with references still by name.
#[derive(Debug, Clone)]
enum PendingDetail {
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
        keys: Vec<String>,
        uniques: Vec<String>,
        min_elements: u32,
        max_elements: Option<u32>,
        ordered_by: OrderedBy,
    },
    Choice {
        default_case: Option<String>,
    },
    Simple(NodeKind),
}

/// The definition of a single schema node.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use yangcheck::schema::{NodeDef, Status, TypeDef};
///
/// let def = NodeDef::leaf_list("dns-server", Arc::new(TypeDef::string()))
///     .config(false)
///     .max_elements(3)
///     .status(Status::Deprecated);
/// ```
pub struct NodeDef {
    name: String,
    detail: PendingDetail,
    config: Option<bool>,
    status: Status,
    mandatory: bool,
    if_features: Vec<IfFeature>,
    musts: Vec<Must>,
    when: Option<When>,
    extensions: Vec<Arc<dyn ExtensionPlugin>>,
    extension_names: Vec<String>,
}

impl NodeDef {
    fn new(name: impl Into<String>, detail: PendingDetail) -> Self {
        Self {
            name: name.into(),
            detail,
            config: None,
            status: Status::Current,
            mandatory: false,
            if_features: Vec::new(),
            musts: Vec::new(),
            when: None,
            extensions: Vec::new(),
            extension_names: Vec::new(),
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Container { presence: false })
    }

    pub fn presence_container(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Container { presence: true })
    }

    pub fn leaf(name: impl Into<String>, ty: Arc<TypeDef>) -> Self {
        Self::new(name, PendingDetail::Leaf { ty, default: None })
    }

    pub fn leaf_list(name: impl Into<String>, ty: Arc<TypeDef>) -> Self {
        Self::new(
            name,
            PendingDetail::LeafList {
                ty,
                defaults: Vec::new(),
                min_elements: 0,
                max_elements: None,
                ordered_by: OrderedBy::System,
            },
        )
    }

    pub fn list(name: impl Into<String>, keys: &[&str]) -> Self {
        Self::new(
            name,
            PendingDetail::List {
                keys: keys.iter().map(|k| k.to_string()).collect(),
                uniques: Vec::new(),
                min_elements: 0,
                max_elements: None,
                ordered_by: OrderedBy::System,
            },
        )
    }

    pub fn choice(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Choice { default_case: None })
    }

    pub fn case(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::Case))
    }

    pub fn uses(grouping: impl Into<String>) -> Self {
        Self::new(grouping, PendingDetail::Simple(NodeKind::Uses))
    }

    pub fn anydata(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::AnyData))
    }

    pub fn anyxml(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::AnyXml))
    }

    pub fn rpc(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::Rpc))
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::Action))
    }

    pub fn input() -> Self {
        Self::new("input", PendingDetail::Simple(NodeKind::Input))
    }

    pub fn output() -> Self {
        Self::new("output", PendingDetail::Simple(NodeKind::Output))
    }

    pub fn notification(name: impl Into<String>) -> Self {
        Self::new(name, PendingDetail::Simple(NodeKind::Notification))
    }

    pub fn config(mut self, config: bool) -> Self {
        self.config = Some(config);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn if_feature(mut self, expr: IfFeature) -> Self {
        self.if_features.push(expr);
        self
    }

    pub fn must(mut self, must: Must) -> Self {
        self.musts.push(must);
        self
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }

    /// Binds an extension plugin directly.
    pub fn extension(mut self, ext: Arc<dyn ExtensionPlugin>) -> Self {
        self.extensions.push(ext);
        self
    }

    /// Binds an extension plugin by name, resolved from the builder's registry.
    pub fn extension_named(mut self, name: impl Into<String>) -> Self {
        self.extension_names.push(name.into());
        self
    }

    /// Sets the leaf default, adds a leaf-list default, or names the default case.
    pub fn default(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        match &mut self.detail {
            PendingDetail::Leaf { default, .. } => *default = Some(value),
            PendingDetail::LeafList { defaults, .. } => defaults.push(value),
            PendingDetail::Choice { default_case } => *default_case = Some(value),
            _ => {}
        }
        self
    }

    /// Adds a `unique` statement to a list.
    pub fn unique(mut self, expr: impl Into<String>) -> Self {
        if let PendingDetail::List { uniques, .. } = &mut self.detail {
            uniques.push(expr.into());
        }
        self
    }

    pub fn min_elements(mut self, min: u32) -> Self {
        match &mut self.detail {
            PendingDetail::List { min_elements, .. }
            | PendingDetail::LeafList { min_elements, .. } => *min_elements = min,
            _ => {}
        }
        self
    }

    pub fn max_elements(mut self, max: u32) -> Self {
        match &mut self.detail {
            PendingDetail::List { max_elements, .. }
            | PendingDetail::LeafList { max_elements, .. } => *max_elements = Some(max),
            _ => {}
        }
        self
    }

    pub fn ordered_by_user(mut self) -> Self {
        match &mut self.detail {
            PendingDetail::List { ordered_by, .. } | PendingDetail::LeafList { ordered_by, .. } => {
                *ordered_by = OrderedBy::User
            }
            _ => {}
        }
        self
    }

    fn kind(&self) -> NodeKind {
        match &self.detail {
            PendingDetail::Container { .. } => NodeKind::Container,
            PendingDetail::Leaf { .. } => NodeKind::Leaf,
            PendingDetail::LeafList { .. } => NodeKind::LeafList,
            PendingDetail::List { .. } => NodeKind::List,
            PendingDetail::Choice { .. } => NodeKind::Choice,
            PendingDetail::Simple(kind) => *kind,
        }
    }
}

/// Names that `build` still has to turn into ids.
#[derive(Default)]
struct PendingRefs {
    keys: Vec<String>,
    uniques: Vec<String>,
    default_case: Option<String>,
}

/// Builds a [`Schema`] node by node.
#[derive(Default)]
pub struct SchemaBuilder {
    defs: Vec<(Option<SchemaId>, Arc<Module>, NodeDef)>,
    registry: Option<ExtensionRegistry>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `registry` to resolve `NodeDef::extension_named` bindings.
    pub fn with_extensions(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a node under `parent` (top level for `None`) and returns its id.
    ///
    /// Parents must be added before their children.
    pub fn add(&mut self, parent: Option<SchemaId>, module: &Arc<Module>, def: NodeDef) -> SchemaId {
        let id = SchemaId(self.defs.len());
        self.defs.push((parent, Arc::clone(module), def));
        id
    }

    /// Resolves all references and produces the immutable schema.
    ///
    /// # Errors
    ///
    /// Fails on misplaced nodes, unknown keys, unique paths, default cases or
    /// extension names, keyless configuration lists, and `config true` below
    /// `config false`.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut nodes: Vec<SchemaNode> = Vec::with_capacity(self.defs.len());
        let mut roots = Vec::new();
        let mut pending: Vec<PendingRefs> = Vec::with_capacity(self.defs.len());

        for (index, (parent, module, def)) in self.defs.into_iter().enumerate() {
            let id = SchemaId(index);
            let kind = def.kind();

            let parent_node = parent.and_then(|p| nodes.get(p.0));
            if let Some(p) = parent {
                let parent_node = parent_node.ok_or_else(|| SchemaError::InvalidParent {
                    parent: format!("#{}", p.0),
                    child: def.name.clone(),
                })?;
                if !placement_allowed(parent_node.kind(), kind) {
                    return Err(SchemaError::InvalidParent {
                        parent: parent_node.name.clone(),
                        child: def.name.clone(),
                    });
                }
            } else if !placement_allowed_at_top(kind) {
                return Err(SchemaError::InvalidParent {
                    parent: "/".to_string(),
                    child: def.name.clone(),
                });
            }

            let in_operation = kind.is_operation()
                || parent_node.is_some_and(|p| {
                    p.kind().is_operation() || in_operation_subtree(&nodes, p)
                });
            let inherited = parent_node.map_or(true, |p| p.config);
            let config = if in_operation {
                true
            } else {
                match def.config {
                    Some(true) if !inherited => {
                        return Err(SchemaError::ConfigTrueUnderFalse(def.name));
                    }
                    Some(explicit) => explicit,
                    None => inherited,
                }
            };

            let mut extensions = def.extensions;
            for name in &def.extension_names {
                let registry = self
                    .registry
                    .as_ref()
                    .ok_or_else(|| super::RegistryError::NotFound(name.clone()))?;
                extensions.push(registry.resolve(name)?);
            }

            let mut refs = PendingRefs::default();
            let detail = match def.detail {
                PendingDetail::Container { presence } => NodeDetail::Container { presence },
                PendingDetail::Leaf { ty, default } => NodeDetail::Leaf { ty, default },
                PendingDetail::LeafList {
                    ty,
                    defaults,
                    min_elements,
                    max_elements,
                    ordered_by,
                } => NodeDetail::LeafList {
                    ty,
                    defaults,
                    min_elements,
                    max_elements,
                    ordered_by,
                },
                PendingDetail::List {
                    keys,
                    uniques,
                    min_elements,
                    max_elements,
                    ordered_by,
                } => {
                    refs.keys = keys;
                    refs.uniques = uniques;
                    NodeDetail::List {
                        keys: Vec::new(),
                        uniques: Vec::new(),
                        min_elements,
                        max_elements,
                        ordered_by,
                    }
                }
                PendingDetail::Choice { default_case } => {
                    refs.default_case = default_case;
                    NodeDetail::Choice { default_case: None }
                }
                PendingDetail::Simple(kind) => simple_detail(kind),
            };

            match parent {
                Some(p) => nodes[p.0].children.push(id),
                None => roots.push(id),
            }

            nodes.push(SchemaNode {
                id,
                parent,
                children: Vec::new(),
                name: def.name,
                module,
                config,
                status: def.status,
                mandatory: def.mandatory,
                if_features: def.if_features,
                musts: def.musts,
                when: def.when,
                extensions,
                ext_validation: ExtValidation::None,
                detail,
            });
            pending.push(refs);
        }

        let mut schema = Schema { nodes, roots };
        resolve_references(&mut schema, pending)?;
        compute_ext_validation(&mut schema);
        Ok(schema)
    }
}

fn simple_detail(kind: NodeKind) -> NodeDetail {
    match kind {
        NodeKind::Case => NodeDetail::Case,
        NodeKind::Uses => NodeDetail::Uses,
        NodeKind::AnyData => NodeDetail::AnyData,
        NodeKind::AnyXml => NodeDetail::AnyXml,
        NodeKind::Rpc => NodeDetail::Rpc,
        NodeKind::Action => NodeDetail::Action,
        NodeKind::Input => NodeDetail::Input,
        NodeKind::Output => NodeDetail::Output,
        NodeKind::Notification => NodeDetail::Notification,
        NodeKind::Container => NodeDetail::Container { presence: false },
        NodeKind::Choice => NodeDetail::Choice { default_case: None },
        NodeKind::Leaf | NodeKind::LeafList | NodeKind::List => {
            unreachable!("typed kinds are never built as simple details")
        }
    }
}

fn in_operation_subtree(nodes: &[SchemaNode], node: &SchemaNode) -> bool {
    std::iter::successors(node.parent, |p| nodes[p.0].parent)
        .any(|a| nodes[a.0].kind().is_operation())
}

fn placement_allowed_at_top(child: NodeKind) -> bool {
    !matches!(
        child,
        NodeKind::Case | NodeKind::Input | NodeKind::Output | NodeKind::Action
    )
}

fn placement_allowed(parent: NodeKind, child: NodeKind) -> bool {
    match parent {
        NodeKind::Leaf | NodeKind::LeafList | NodeKind::AnyData | NodeKind::AnyXml => false,
        NodeKind::Rpc | NodeKind::Action => matches!(child, NodeKind::Input | NodeKind::Output),
        NodeKind::Choice => !matches!(
            child,
            NodeKind::Choice | NodeKind::Input | NodeKind::Output | NodeKind::Rpc
        ),
        _ => !matches!(
            child,
            NodeKind::Case | NodeKind::Input | NodeKind::Output | NodeKind::Rpc
        ),
    }
}

fn resolve_references(schema: &mut Schema, pending: Vec<PendingRefs>) -> Result<(), SchemaError> {
    for (index, refs) in pending.into_iter().enumerate() {
        let id = SchemaId(index);
        let node = schema.node(id);

        match node.kind() {
            NodeKind::List => {
                let mut keys = Vec::with_capacity(refs.keys.len());
                for key in &refs.keys {
                    let leaf = schema
                        .find_data_child(Some(id), key)
                        .filter(|k| schema.node(*k).kind() == NodeKind::Leaf)
                        .ok_or_else(|| SchemaError::UnknownKey {
                            list: node.name.clone(),
                            key: key.clone(),
                        })?;
                    keys.push(leaf);
                }
                if keys.is_empty() && node.config && schema.operation_of(id).is_none() {
                    return Err(SchemaError::MissingKeys(node.name.clone()));
                }

                let mut uniques = Vec::with_capacity(refs.uniques.len());
                for expr in refs.uniques {
                    uniques.push(compile_unique(schema, id, expr)?);
                }

                if let NodeDetail::List {
                    keys: k,
                    uniques: u,
                    ..
                } = &mut schema.nodes[index].detail
                {
                    *k = keys;
                    *u = uniques;
                }
            }
            NodeKind::Choice => {
                let Some(case_name) = refs.default_case else {
                    continue;
                };
                let case = node
                    .children
                    .iter()
                    .copied()
                    .find(|c| schema.node(*c).name == strip_prefix(&case_name))
                    .ok_or_else(|| SchemaError::UnknownCase {
                        choice: node.name.clone(),
                        case: case_name.clone(),
                    })?;
                schema.nodes[index].detail = NodeDetail::Choice {
                    default_case: Some(case),
                };
            }
            _ => {}
        }
    }
    Ok(())
}

fn compile_unique(schema: &Schema, list: SchemaId, expr: String) -> Result<Unique, SchemaError> {
    let unknown = || SchemaError::UnknownUniqueLeaf {
        list: schema.node(list).name.clone(),
        expr: expr.clone(),
    };

    let mut paths = Vec::new();
    let mut leaves = Vec::new();
    for descendant in expr.split_whitespace() {
        let steps: Vec<String> = descendant
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| strip_prefix(s).to_string())
            .collect();
        let mut current = list;
        for step in &steps {
            current = schema.find_data_child(Some(current), step).ok_or_else(unknown)?;
        }
        if steps.is_empty() || schema.node(current).kind() != NodeKind::Leaf {
            return Err(unknown());
        }
        paths.push(steps);
        leaves.push(current);
    }
    if paths.is_empty() {
        return Err(unknown());
    }

    Ok(Unique {
        expr,
        paths,
        leaves,
    })
}

fn compute_ext_validation(schema: &mut Schema) {
    for index in 0..schema.nodes.len() {
        let node = &schema.nodes[index];
        let mut any = !node.extensions.is_empty();
        let mut subtree = node
            .extensions
            .iter()
            .any(|e| e.scope() == ExtensionScope::Subtree);
        if let Some(ty) = node.leaf_type() {
            any |= ty.chain_requests_validation();
            ty.for_each_extension(&mut |e| subtree |= e.scope() == ExtensionScope::Subtree);
        }
        schema.nodes[index].ext_validation = match (any, subtree) {
            (_, true) => ExtValidation::Subtree,
            (true, false) => ExtValidation::Node,
            (false, false) => ExtValidation::None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FnExtension, YangVersion};

    fn module() -> Arc<Module> {
        Module::new("ex", YangVersion::V1_1).into_shared()
    }

    fn string() -> Arc<TypeDef> {
        Arc::new(TypeDef::string())
    }

    #[test]
    fn test_keys_and_uniques_resolve() {
        let m = module();
        let mut b = SchemaBuilder::new();
        let list = b.add(None, &m, NodeDef::list("server", &["ex:name"]).unique("addr/ip"));
        let name = b.add(Some(list), &m, NodeDef::leaf("name", string()));
        let addr = b.add(Some(list), &m, NodeDef::container("addr"));
        let ip = b.add(Some(addr), &m, NodeDef::leaf("ip", string()));
        let schema = b.build().unwrap();

        assert_eq!(schema.node(list).keys(), &[name]);
        let unique = &schema.node(list).uniques()[0];
        assert_eq!(unique.leaves, vec![ip]);
        assert_eq!(unique.paths, vec![vec!["addr".to_string(), "ip".to_string()]]);
    }

    #[test]
    fn test_unknown_key_fails() {
        let m = module();
        let mut b = SchemaBuilder::new();
        let list = b.add(None, &m, NodeDef::list("server", &["id"]));
        b.add(Some(list), &m, NodeDef::leaf("name", string()));
        assert!(matches!(b.build(), Err(SchemaError::UnknownKey { .. })));
    }

    #[test]
    fn test_keyless_config_list_fails_but_state_list_is_fine() {
        let m = module();
        let mut b = SchemaBuilder::new();
        b.add(None, &m, NodeDef::list("log", &[]));
        assert!(matches!(b.build(), Err(SchemaError::MissingKeys(_))));

        let mut b = SchemaBuilder::new();
        b.add(None, &m, NodeDef::list("log", &[]).config(false));
        assert!(b.build().is_ok());
    }

    #[test]
    fn test_config_inheritance() {
        let m = module();
        let mut b = SchemaBuilder::new();
        let state = b.add(None, &m, NodeDef::container("state").config(false));
        let counter = b.add(Some(state), &m, NodeDef::leaf("counter", string()));
        let schema = b.build().unwrap();
        assert!(!schema.node(counter).is_config());

        let mut b = SchemaBuilder::new();
        let state = b.add(None, &m, NodeDef::container("state").config(false));
        b.add(Some(state), &m, NodeDef::leaf("knob", string()).config(true));
        assert!(matches!(b.build(), Err(SchemaError::ConfigTrueUnderFalse(_))));
    }

    #[test]
    fn test_invalid_placement() {
        let m = module();
        let mut b = SchemaBuilder::new();
        let leaf = b.add(None, &m, NodeDef::leaf("x", string()));
        b.add(Some(leaf), &m, NodeDef::leaf("y", string()));
        assert!(matches!(b.build(), Err(SchemaError::InvalidParent { .. })));
    }

    #[test]
    fn test_default_case_resolves() {
        let m = module();
        let mut b = SchemaBuilder::new();
        let choice = b.add(None, &m, NodeDef::choice("c").default("b"));
        b.add(Some(choice), &m, NodeDef::case("a"));
        let case_b = b.add(Some(choice), &m, NodeDef::case("b"));
        let schema = b.build().unwrap();
        assert!(matches!(
            schema.node(choice).detail(),
            NodeDetail::Choice { default_case: Some(c) } if *c == case_b
        ));
    }

    #[test]
    fn test_named_extensions_bind_through_registry() {
        let registry = ExtensionRegistry::new();
        registry
            .register(
                FnExtension::new("ex:audit", |_, _| true).with_scope(ExtensionScope::Subtree),
            )
            .unwrap();

        let m = module();
        let mut b = SchemaBuilder::new().with_extensions(registry);
        let top = b.add(None, &m, NodeDef::container("top").extension_named("ex:audit"));
        let plain = b.add(Some(top), &m, NodeDef::leaf("plain", string()));
        let schema = b.build().unwrap();
        assert_eq!(schema.node(top).ext_validation(), ExtValidation::Subtree);
        assert_eq!(schema.node(plain).ext_validation(), ExtValidation::None);

        let mut b = SchemaBuilder::new();
        b.add(None, &m, NodeDef::container("top").extension_named("ex:missing"));
        assert!(matches!(b.build(), Err(SchemaError::Extension(_))));
    }
}
