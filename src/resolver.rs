//! Resolution of deferred checks.
//!
//! The validator only schedules checks that need the whole tree or an XPath
//! context; a [`Resolver`] answers them later. [`PathResolver`] is the default
//! implementation: it follows predicate-free leafref paths and
//! instance-identifiers itself and hands `must`/`when` expressions to an
//! injected [`XPathEvaluator`].

use std::sync::Arc;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::path::DataPath;
use crate::schema::{strip_prefix, IfFeature, Must, NodeKind, Schema, SchemaId, TypeDef, TypeKind};
use crate::unres::{UnresItem, UnresKind};
use crate::validity::Validity;

/// Which `must` checks apply to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MustApplicability {
    /// The node carries `must` statements of its own.
    pub has_must: bool,
    /// The enclosing RPC/action input or output carries `must` statements.
    pub has_must_inout: bool,
}

/// Outcome of one resolution attempt that did not find a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    /// Not decidable yet, e.g. the target has not been attached.
    Retry,
}

/// The XPath/resolution collaborator of the validator.
///
/// `resolve` reports a violation as `Err(Error::Invalid(..))`; `Retry` leaves
/// the decision to a later pass.
pub trait Resolver: Send + Sync {
    fn applies_must(&self, schema: &Schema, id: SchemaId) -> MustApplicability {
        MustApplicability {
            has_must: !schema.node(id).musts().is_empty(),
            has_must_inout: inout_musts(schema, id).next().is_some(),
        }
    }

    fn resolve_if_feature(&self, expr: &IfFeature) -> bool {
        expr.is_satisfied()
    }

    /// Returns the value of the leaf at `path` (node names relative to
    /// `ctx`), falling back to the schema default when `use_default` is set
    /// and the leaf is absent.
    fn resolve_descendant(
        &self,
        tree: &DataTree,
        ctx: NodeId,
        path: &[String],
        use_default: bool,
    ) -> Option<String> {
        let schema = tree.schema();
        let mut data = Some(ctx);
        let mut schema_id = tree.get(ctx)?.schema();

        for step in path {
            let name = strip_prefix(step);
            schema_id = schema.find_data_child(Some(schema_id), name)?;
            data = data.and_then(|d| {
                tree.children(Some(d))
                    .iter()
                    .copied()
                    .find(|c| tree.get(*c).is_some_and(|n| n.schema() == schema_id))
            });
        }

        match data.and_then(|d| tree.value(d)) {
            Some(value) => Some(value.canonical.clone()),
            None if use_default => schema.node(schema_id).default_value().map(str::to_string),
            None => None,
        }
    }

    fn resolve(&self, tree: &mut DataTree, item: &UnresItem) -> Result<Resolution, Error>;
}

/// Evaluates `must`/`when` expressions.
///
/// `Ok(None)` means the expression cannot be decided yet.
pub trait XPathEvaluator: Send + Sync {
    fn evaluate(&self, tree: &DataTree, ctx: NodeId, expr: &str) -> Result<Option<bool>, Error>;
}

/// `must` statements of the input/output enclosing `id`.
fn inout_musts(schema: &Schema, id: SchemaId) -> impl Iterator<Item = &Must> + '_ {
    schema
        .ancestors(id)
        .take_while(move |a| !schema.node(*a).kind().is_instantiable())
        .filter(move |a| matches!(schema.node(*a).kind(), NodeKind::Input | NodeKind::Output))
        .flat_map(move |a| schema.node(a).musts())
}

/// The input/output statements holding the payload of an operation instance.
fn payload_sides(tree: &DataTree, schema: &Schema, operation: NodeId) -> Result<Vec<SchemaId>, Error> {
    let mut sides = Vec::new();
    for child in tree.children(Some(operation)) {
        let id = tree.node(*child)?.schema();
        for side in schema
            .ancestors(id)
            .take_while(|a| !schema.node(*a).kind().is_instantiable())
            .filter(|a| matches!(schema.node(*a).kind(), NodeKind::Input | NodeKind::Output))
        {
            if !sides.contains(&side) {
                sides.push(side);
            }
        }
    }
    Ok(sides)
}

/// Resolves leafrefs and instance-identifiers by walking the tree.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use yangcheck::data::DataTree;
/// use yangcheck::resolver::{PathResolver, Resolution, Resolver};
/// use yangcheck::schema::{Module, NodeDef, Schema, TypeDef, YangVersion};
/// use yangcheck::{UnresItem, UnresKind};
///
/// let ex = Module::new("ex", YangVersion::V1_1).into_shared();
/// let mut b = Schema::builder();
/// let users = b.add(None, &ex, NodeDef::leaf_list("user", Arc::new(TypeDef::string())));
/// let admin = b.add(None, &ex, NodeDef::leaf("admin", Arc::new(TypeDef::leafref("/ex:user"))));
/// let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
///
/// let alice = tree.insert_leaf(None, users, "alice").unwrap();
/// let leaf = tree.insert_leaf(None, admin, "alice").unwrap();
///
/// let resolver = PathResolver::new();
/// let outcome = resolver.resolve(&mut tree, &UnresItem::new(leaf, UnresKind::Leafref)).unwrap();
/// assert_eq!(outcome, Resolution::Resolved);
/// assert_eq!(tree.node(leaf).unwrap().leafref_target(), Some(alice));
/// ```
#[derive(Clone, Default)]
pub struct PathResolver {
    xpath: Option<Arc<dyn XPathEvaluator>>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the evaluator used for `must` and `when` expressions.
    pub fn with_xpath(mut self, evaluator: Arc<dyn XPathEvaluator>) -> Self {
        self.xpath = Some(evaluator);
        self
    }

    fn evaluator(&self) -> Result<&dyn XPathEvaluator, Error> {
        self.xpath
            .as_deref()
            .ok_or_else(|| Error::Internal("no XPath evaluator configured".to_string()))
    }

    fn resolve_leafref(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        path: &str,
    ) -> Result<Resolution, Error> {
        if path.contains('[') {
            return Err(Error::Internal(format!(
                "leafref path predicates are not supported: {path}"
            )));
        }
        let Some(value) = tree.value(node).map(|v| v.canonical.clone()) else {
            return Err(Error::Internal("leafref node has no value".to_string()));
        };

        let target = leafref_candidates(tree, node, path)
            .into_iter()
            .find(|c| tree.value(*c).is_some_and(|v| v.canonical == value));

        match target {
            Some(target) => {
                tree.set_leafref_target(node, Some(target))?;
                tree.clear_validity(node, Validity::LEAFREF)?;
                Ok(Resolution::Resolved)
            }
            None => Ok(Resolution::Retry),
        }
    }

    fn resolve_instid(&self, tree: &DataTree, node: NodeId) -> Result<Resolution, Error> {
        let Some(value) = tree.value(node) else {
            return Err(Error::Internal("instance-identifier node has no value".to_string()));
        };
        let path: DataPath = value
            .canonical
            .parse()
            .map_err(|e| Error::Internal(format!("stored instance-identifier: {e}")))?;
        Ok(match tree.find(&path) {
            Some(_) => Resolution::Resolved,
            None => Resolution::Retry,
        })
    }

    fn resolve_union(&self, tree: &mut DataTree, node: NodeId) -> Result<Resolution, Error> {
        let Some(member) = tree.value(node).map(|v| Arc::clone(&v.ty)) else {
            return Err(Error::Internal("union node has no value".to_string()));
        };
        match member_pointer(&member) {
            Some(TypeKind::Leafref { path }) => self.resolve_leafref(tree, node, path),
            Some(TypeKind::InstanceIdentifier) => self.resolve_instid(tree, node),
            _ => {
                tree.clear_validity(node, Validity::LEAFREF)?;
                Ok(Resolution::Resolved)
            }
        }
    }

    fn check_musts<'a>(
        &self,
        tree: &DataTree,
        node: NodeId,
        musts: impl Iterator<Item = &'a Must>,
    ) -> Result<Resolution, Error> {
        let evaluator = self.evaluator()?;
        for must in musts {
            match evaluator.evaluate(tree, node, &must.expr)? {
                Some(true) => {}
                Some(false) => {
                    let message = must
                        .error_message
                        .clone()
                        .unwrap_or_else(|| format!("must condition '{}' not satisfied", must.expr));
                    return Err(ValidationError::new(tree.path(node)?, ErrorCode::MustViolation, message)
                        .with_expected(must.expr.clone())
                        .into());
                }
                None => return Ok(Resolution::Retry),
            }
        }
        Ok(Resolution::Resolved)
    }

    fn check_when(&self, tree: &DataTree, node: NodeId) -> Result<Resolution, Error> {
        let evaluator = self.evaluator()?;
        let schema = tree.schema();
        let id = tree.node(node)?.schema();
        let conditions = std::iter::once(id)
            .chain(
                schema
                    .ancestors(id)
                    .take_while(|a| !schema.node(*a).kind().is_instantiable()),
            )
            .filter_map(|s| schema.node(s).when());

        for when in conditions {
            match evaluator.evaluate(tree, node, &when.expr)? {
                Some(true) => {}
                Some(false) => {
                    return Err(ValidationError::new(
                        tree.path(node)?,
                        ErrorCode::WhenViolation,
                        format!("when condition '{}' not satisfied", when.expr),
                    )
                    .into())
                }
                None => return Ok(Resolution::Retry),
            }
        }
        Ok(Resolution::Resolved)
    }
}

impl Resolver for PathResolver {
    fn resolve(&self, tree: &mut DataTree, item: &UnresItem) -> Result<Resolution, Error> {
        let schema = Arc::clone(tree.schema());
        let id = tree.node(item.node)?.schema();
        match item.kind {
            UnresKind::Leafref => {
                let path = schema
                    .node(id)
                    .leaf_type()
                    .and_then(|ty| ty.leafref_path())
                    .ok_or_else(|| Error::Internal("node is not a leafref".to_string()))?
                    .to_string();
                self.resolve_leafref(tree, item.node, &path)
            }
            UnresKind::InstanceId => self.resolve_instid(tree, item.node),
            UnresKind::Union => self.resolve_union(tree, item.node),
            UnresKind::Must => self.check_musts(tree, item.node, schema.node(id).musts().iter()),
            UnresKind::MustInOut => {
                let sides = payload_sides(tree, &schema, item.node)?;
                self.check_musts(tree, item.node, sides.iter().flat_map(|s| schema.node(*s).musts()))
            }
            UnresKind::When => self.check_when(tree, item.node),
            UnresKind::UniqueLeaves => Err(Error::Internal(
                "unique checks are run by the validator".to_string(),
            )),
        }
    }
}

/// The pointer kind of the union member that accepted a value.
fn member_pointer(member: &TypeDef) -> Option<&TypeKind> {
    match &member.kind {
        kind @ (TypeKind::Leafref { .. } | TypeKind::InstanceIdentifier) => Some(kind),
        _ => None,
    }
}

/// Instances addressed by a predicate-free leafref path, evaluated from `node`.
fn leafref_candidates(tree: &DataTree, node: NodeId, path: &str) -> Vec<NodeId> {
    // `None` stands for the top level
    let mut scope: Vec<Option<NodeId>> = if path.starts_with('/') {
        vec![None]
    } else {
        vec![Some(node)]
    };

    for step in path.split('/').filter(|s| !s.is_empty()) {
        scope = match step.trim() {
            "." => scope,
            ".." => scope
                .into_iter()
                .filter_map(|s| s.map(|id| tree.get(id).and_then(|n| n.parent())))
                .collect(),
            step => {
                let name = strip_prefix(step);
                scope
                    .into_iter()
                    .flat_map(|s| tree.children(s).iter().copied())
                    .filter(|c| tree.schema_node(*c).is_ok_and(|sn| sn.name() == name))
                    .map(Some)
                    .collect()
            }
        };
    }

    scope.into_iter().flatten().collect()
}
