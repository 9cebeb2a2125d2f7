//! Checks of where a node sits: features, operations, config and order.

use std::sync::Arc;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::resolver::Resolver;
use crate::schema::{Schema, SchemaId};
use crate::unres::{UnresKind, WorkList};
use crate::validity::Validity;

use super::options::{ValidationMode, ValidationOptions};

/// `id` followed by its non-instantiable ancestors up to the nearest data node.
pub(crate) fn own_chain(schema: &Schema, id: SchemaId) -> impl Iterator<Item = SchemaId> + '_ {
    std::iter::once(id).chain(
        schema
            .ancestors(id)
            .take_while(move |a| !schema.node(*a).kind().is_instantiable()),
    )
}

pub(crate) fn validate_context(
    options: &ValidationOptions,
    resolver: &dyn Resolver,
    tree: &mut DataTree,
    node: NodeId,
    work: &mut WorkList,
) -> Result<(), Error> {
    let schema = Arc::clone(tree.schema());
    let sid = tree.node(node)?.schema();
    let schema_node = schema.node(sid);

    let disabled = own_chain(&schema, sid).find(|s| {
        !schema
            .node(*s)
            .if_features()
            .iter()
            .all(|f| resolver.resolve_if_feature(f))
    });
    if let Some(disabled) = disabled {
        return Err(ValidationError::new(
            tree.path(node)?,
            ErrorCode::DisabledNode,
            format!(
                "'{}' is disabled by if-feature of '{}'",
                schema_node.name(),
                schema.node(disabled).name()
            ),
        )
        .into());
    }

    let operation = schema.operation_of(sid);

    if options.schedules_deferred() {
        if let Some(ty) = schema_node.leaf_type() {
            if ty.is_leafref_like() {
                tree.set_leafref_target(node, None)?;
            }
            if let Some(kind) = ty.deferred_kind() {
                if work.push(node, kind) {
                    tracing::debug!(node = %tree.path(node)?, ?kind, "scheduled");
                }
            }
        }
        if own_chain(&schema, sid).any(|s| schema.node(s).when().is_some())
            && work.push(node, UnresKind::When)
        {
            tracing::debug!(node = %tree.path(node)?, kind = ?UnresKind::When, "scheduled");
        }
    } else if options.is_read_only_view() {
        tree.clear_validity(node, Validity::LEAFREF)?;
    }

    if options.is_config_only() && operation.is_none() && !schema_node.is_config() {
        return Err(ValidationError::new(
            tree.path(node)?,
            ErrorCode::ReadOnlyInEditableContext,
            format!("state data '{}' in configuration", schema_node.name()),
        )
        .into());
    }

    if matches!(options.mode, ValidationMode::Rpc | ValidationMode::RpcReply)
        && operation.is_some_and(|op| op != sid)
    {
        check_payload_order(tree, &schema, node, sid)?;
    }

    Ok(())
}

/// The sibling before `node` must not come after it in schema order.
fn check_payload_order(
    tree: &DataTree,
    schema: &Schema,
    node: NodeId,
    sid: SchemaId,
) -> Result<(), Error> {
    let Some(previous) = tree.previous_sibling(node) else {
        return Ok(());
    };
    let previous_sid = tree.node(previous)?.schema();
    if previous_sid == sid {
        return Ok(());
    }

    let order = schema.data_children(schema.data_parent(sid));
    let position = |s: SchemaId| order.iter().position(|o| *o == s);
    match (position(previous_sid), position(sid)) {
        (Some(before), Some(current)) if before > current => Err(ValidationError::new(
            tree.path(node)?,
            ErrorCode::OutOfOrderElement,
            format!(
                "'{}' must precede '{}'",
                schema.node(sid).name(),
                schema.node(previous_sid).name()
            ),
        )
        .with_related(tree.path(previous)?)
        .into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PathResolver;
    use crate::schema::{IfFeature, Module, NodeDef, TypeDef, When, YangVersion};

    struct Fixture {
        tree: DataTree,
        top: NodeId,
        fast: SchemaId,
        counter: SchemaId,
        peer: SchemaId,
        guarded: SchemaId,
        module: Arc<Module>,
    }

    fn fixture() -> Fixture {
        let ex = Module::new("ex", YangVersion::V1_1)
            .with_feature("fast", false)
            .into_shared();
        let string = Arc::new(TypeDef::string());
        let mut b = Schema::builder();
        let top = b.add(None, &ex, NodeDef::container("top"));
        let fast = b.add(
            Some(top),
            &ex,
            NodeDef::leaf("fast", Arc::clone(&string)).if_feature(IfFeature::feature(&ex, "fast")),
        );
        let counter = b.add(
            Some(top),
            &ex,
            NodeDef::leaf("counter", Arc::new(TypeDef::uint())).config(false),
        );
        let peer = b.add(
            Some(top),
            &ex,
            NodeDef::leaf("peer", Arc::new(TypeDef::leafref("../fast"))),
        );
        let guarded = b.add(
            Some(top),
            &ex,
            NodeDef::leaf("guarded", string).when(When::new("../fast")),
        );
        let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
        let top = tree.insert_inner(None, top).unwrap();
        Fixture {
            tree,
            top,
            fast,
            counter,
            peer,
            guarded,
            module: ex,
        }
    }

    #[test]
    fn test_feature_gate_follows_runtime_toggle() {
        let mut f = fixture();
        let fast = f.tree.insert_leaf(Some(f.top), f.fast, "on").unwrap();
        let options = ValidationOptions::default();
        let resolver = PathResolver::new();
        let mut work = WorkList::new();

        let err = validate_context(&options, &resolver, &mut f.tree, fast, &mut work).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DisabledNode));

        f.module.set_feature("fast", true).unwrap();
        validate_context(&options, &resolver, &mut f.tree, fast, &mut work).unwrap();
    }

    #[test]
    fn test_state_data_rejected_in_config() {
        let mut f = fixture();
        let counter = f.tree.insert_leaf(Some(f.top), f.counter, "4").unwrap();
        let resolver = PathResolver::new();
        let mut work = WorkList::new();

        let config = ValidationOptions::new(ValidationMode::Config);
        let err =
            validate_context(&config, &resolver, &mut f.tree, counter, &mut work).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ReadOnlyInEditableContext));

        let data = ValidationOptions::new(ValidationMode::Data);
        validate_context(&data, &resolver, &mut f.tree, counter, &mut work).unwrap();
    }

    #[test]
    fn test_scheduling_is_idempotent_until_drained() {
        let mut f = fixture();
        let peer = f.tree.insert_leaf(Some(f.top), f.peer, "x").unwrap();
        let guarded = f.tree.insert_leaf(Some(f.top), f.guarded, "y").unwrap();
        let options = ValidationOptions::default();
        let resolver = PathResolver::new();
        let mut work = WorkList::new();

        for _ in 0..2 {
            validate_context(&options, &resolver, &mut f.tree, peer, &mut work).unwrap();
            validate_context(&options, &resolver, &mut f.tree, guarded, &mut work).unwrap();
        }
        assert_eq!(work.count(UnresKind::Leafref), 1);
        assert_eq!(work.count(UnresKind::When), 1);

        work.drain();
        validate_context(&options, &resolver, &mut f.tree, peer, &mut work).unwrap();
        assert_eq!(work.len(), 1);
    }

    #[test]
    fn test_get_clears_leafref_without_scheduling() {
        let mut f = fixture();
        let peer = f.tree.insert_leaf(Some(f.top), f.peer, "x").unwrap();
        let options = ValidationOptions::new(ValidationMode::Get);
        let mut work = WorkList::new();

        validate_context(&options, &PathResolver::new(), &mut f.tree, peer, &mut work).unwrap();
        assert!(work.is_empty());
        assert!(!f.tree.validity(peer).unwrap().contains(Validity::LEAFREF));
    }
}
