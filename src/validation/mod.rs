//! The validator: per-node checks, deferred-work resolution and whole-tree
//! entry points.
//!
//! Per-node calls ([`Validator::validate_node`] and the steps it is made of)
//! return the first hard failure as `Err(Error::Invalid(..))`. Tree-level calls
//! keep going across nodes and accumulate every violation into a
//! [`ValidationResult`]; only `Error::Resource` and `Error::Internal` abort them.

mod choice;
mod content;
mod context;
mod dup;
mod extension;
mod mandatory;
mod options;

use std::sync::Arc;

use rayon::prelude::*;
use stillwater::Validation;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError, ValidationErrors};
use crate::resolver::{PathResolver, Resolution, Resolver};
use crate::unres::{UnresItem, UnresKind, WorkList};
use crate::ValidationResult;

pub use options::{ValidationMode, ValidationOptions};

/// Validates data trees against the schema they were built with.
///
/// A validator holds no per-tree state, so one instance can validate any
/// number of trees, from any number of threads.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use yangcheck::data::DataTree;
/// use yangcheck::schema::{Module, NodeDef, Schema, TypeDef, YangVersion};
/// use yangcheck::{ErrorCode, ValidationOptions, Validator};
///
/// let ex = Module::new("ex", YangVersion::V1_1).into_shared();
/// let mut b = Schema::builder();
/// let iface = b.add(None, &ex, NodeDef::list("iface", &["name"]));
/// let name = b.add(Some(iface), &ex, NodeDef::leaf("name", Arc::new(TypeDef::string())));
/// let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
///
/// for _ in 0..2 {
///     let entry = tree.insert_inner(None, iface).unwrap();
///     tree.insert_leaf(Some(entry), name, "iface1").unwrap();
/// }
///
/// let validator = Validator::new(ValidationOptions::default());
/// let result = validator.validate_tree(&mut tree).unwrap();
/// let errors = result.into_result().unwrap_err();
/// assert_eq!(errors.first().code, ErrorCode::DuplicateInstance);
/// ```
#[derive(Clone)]
pub struct Validator {
    options: ValidationOptions,
    resolver: Arc<dyn Resolver>,
}

impl Validator {
    /// Creates a validator using a [`PathResolver`] without XPath support.
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            resolver: Arc::new(PathResolver::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Checks where `node` sits: feature gates, config in configuration-only
    /// modes and payload order of operations. Schedules leafref,
    /// instance-identifier, union and `when` checks.
    pub fn validate_context(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        work: &mut WorkList,
    ) -> Result<(), Error> {
        context::validate_context(&self.options, self.resolver.as_ref(), tree, node, work)
    }

    /// Resolves conflicts between `node` and siblings from other cases of
    /// the choices enclosing it. `inserted` is the instance just attached,
    /// which autodelete never removes.
    pub fn enforce_exclusive_case(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        inserted: Option<NodeId>,
    ) -> Result<(), Error> {
        choice::enforce_exclusive_case(tree, node, inserted, self.options.autodelete)
    }

    /// Checks what `node` holds: keys, instance count, status, extensions,
    /// duplicates among its children and value enablement. Schedules
    /// `unique` and `must` checks.
    pub fn validate_content(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        work: &mut WorkList,
    ) -> Result<(), Error> {
        content::validate_content(&self.options, self.resolver.as_ref(), tree, node, work)
    }

    /// Runs every per-node step for a node that was just attached.
    pub fn validate_node(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        work: &mut WorkList,
    ) -> Result<(), Error> {
        self.validate_context(tree, node, work)?;
        self.enforce_exclusive_case(tree, node, Some(node))?;
        self.validate_content(tree, node, work)
    }

    fn resolve_item(&self, tree: &mut DataTree, item: &UnresItem) -> Result<Resolution, Error> {
        match item.kind {
            UnresKind::UniqueLeaves => {
                dup::check_unique_group(tree, item.node, self.resolver.as_ref())?;
                Ok(Resolution::Resolved)
            }
            _ => self.resolver.resolve(tree, item),
        }
    }

    fn unresolved(&self, tree: &DataTree, item: &UnresItem) -> Result<ValidationError, Error> {
        let path = tree.path(item.node)?;
        let value = tree.value(item.node).map(|v| v.canonical.clone());
        let pointer = tree.value(item.node).map(|v| Arc::clone(&v.ty));

        let error = match item.kind {
            UnresKind::Leafref => {
                ValidationError::new(path, ErrorCode::LeafrefUnresolved, "leafref target not found")
            }
            UnresKind::InstanceId => ValidationError::new(
                path,
                ErrorCode::InstanceIdUnresolved,
                "instance-identifier target not found",
            ),
            UnresKind::Union if pointer.as_ref().is_some_and(|ty| ty.is_leafref_like()) => {
                ValidationError::new(path, ErrorCode::LeafrefUnresolved, "leafref target not found")
            }
            UnresKind::Union => ValidationError::new(
                path,
                ErrorCode::InstanceIdUnresolved,
                "instance-identifier target not found",
            ),
            kind => ValidationError::new(
                path,
                ErrorCode::Unresolved,
                format!("{kind:?} check could not be resolved"),
            ),
        };
        Ok(match value {
            Some(value) => error.with_got(value),
            None => error,
        })
    }

    fn drain(&self, tree: &mut DataTree, work: &mut WorkList) -> Result<Vec<ValidationError>, Error> {
        let mut errors = Vec::new();

        loop {
            let batch = work.drain();
            if batch.is_empty() {
                break;
            }

            let mut progressed = false;
            let mut retry = Vec::new();
            for item in batch {
                if !tree.contains(item.node) {
                    continue;
                }
                match self.resolve_item(tree, &item) {
                    Ok(Resolution::Resolved) => progressed = true,
                    Ok(Resolution::Retry) => retry.push(item),
                    Err(Error::Invalid(error)) => {
                        errors.push(*error);
                        progressed = true;
                    }
                    Err(e) => return Err(e),
                }
            }

            if retry.is_empty() {
                break;
            }
            if !progressed {
                tracing::debug!(remaining = retry.len(), "deferred checks made no progress");
                for item in &retry {
                    errors.push(self.unresolved(tree, item)?);
                }
                break;
            }
            for item in retry {
                work.push(item.node, item.kind);
            }
        }

        Ok(errors)
    }

    /// Drains `work` in enqueue order.
    ///
    /// Checks that cannot be decided yet are retried as long as each round
    /// settles at least one other check; whatever is left then is reported
    /// as unresolved.
    pub fn resolve_deferred(
        &self,
        tree: &mut DataTree,
        work: &mut WorkList,
    ) -> Result<ValidationResult<()>, Error> {
        Ok(into_validation(self.drain(tree, work)?))
    }

    /// Validates a complete tree.
    ///
    /// Every node is validated children first, then top-level duplicates,
    /// absent mandatory nodes and element counts are checked, and finally
    /// the deferred checks are resolved.
    pub fn validate_tree(&self, tree: &mut DataTree) -> Result<ValidationResult<()>, Error> {
        let span = tracing::debug_span!("validate_tree", nodes = tree.len(), mode = ?self.options.mode);
        let _enter = span.enter();

        let mut work = WorkList::new();
        let mut errors = Vec::new();
        let mut collect = |outcome: Result<(), Error>| match outcome {
            Ok(()) => Ok(()),
            Err(Error::Invalid(error)) => {
                errors.push(*error);
                Ok(())
            }
            Err(e) => Err(e),
        };

        for node in tree.post_order() {
            // an earlier node may have removed it
            if !tree.contains(node) {
                continue;
            }
            let outcome = self
                .validate_context(tree, node, &mut work)
                .and_then(|()| self.enforce_exclusive_case(tree, node, None))
                .and_then(|()| self.validate_content(tree, node, &mut work));
            collect(outcome)?;
        }
        collect(dup::check_child_groups(
            tree,
            None,
            self.options.is_read_only_view(),
        ))?;

        errors.extend(mandatory::check_presence(
            tree,
            &self.options,
            self.resolver.as_ref(),
        )?);
        errors.extend(self.drain(tree, &mut work)?);

        tracing::debug!(violations = errors.len(), "tree validated");
        Ok(into_validation(errors))
    }

    /// Validates independent trees in parallel.
    ///
    /// The trees may share one schema; each tree is only touched by one
    /// thread.
    pub fn validate_forest(&self, trees: &mut [DataTree]) -> Vec<Result<ValidationResult<()>, Error>> {
        trees
            .par_iter_mut()
            .map(|tree| self.validate_tree(tree))
            .collect()
    }
}

fn into_validation(errors: Vec<ValidationError>) -> ValidationResult<()> {
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Validation::Failure(errors),
        None => Validation::Success(()),
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<Validator>();
    assert_sync::<Validator>();
};
