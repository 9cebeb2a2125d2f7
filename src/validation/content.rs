//! Checks of what a node holds: keys, instance counts, status, duplicates,
//! value enablement and `must` scheduling.

use std::sync::Arc;

use crate::data::{DataTree, NodeId, ValueItem};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::resolver::Resolver;
use crate::schema::{IfFeature, NodeKind, Schema, SchemaId, Status, TypeKind};
use crate::unres::{UnresKind, WorkList};
use crate::validity::Validity;

use super::options::{ValidationMode, ValidationOptions};
use super::{dup, extension};

pub(crate) fn validate_content(
    options: &ValidationOptions,
    resolver: &dyn Resolver,
    tree: &mut DataTree,
    node: NodeId,
    work: &mut WorkList,
) -> Result<(), Error> {
    let schema = Arc::clone(tree.schema());
    let sid = tree.node(node)?.schema();
    let schema_node = schema.node(sid);

    if options.trusted && inside_nested_operation(&schema, sid) {
        tree.clear_validity(node, Validity::MAND | Validity::UNIQUE)?;
        return dup::check_child_groups(tree, Some(node), true);
    }

    if tree.validity(node).is_some_and(|v| v.contains(Validity::MAND)) {
        if schema_node.kind() == NodeKind::List && options.mode != ValidationMode::Filter {
            check_keys(tree, &schema, node, sid)?;
        }
        if !schema_node.kind().is_multi_instance() && options.mode != ValidationMode::Filter {
            check_single_instance(tree, node, sid)?;
        }
        check_obsolete(options, tree, &schema, node, sid)?;
        extension::validate_extensions(tree, node)?;
        tree.clear_validity(node, Validity::MAND)?;
    }
    extension::validate_subtree_ancestors(tree, node)?;

    if matches!(
        schema_node.kind(),
        NodeKind::Container
            | NodeKind::List
            | NodeKind::Rpc
            | NodeKind::Action
            | NodeKind::Notification
    ) {
        dup::check_child_groups(tree, Some(node), options.is_read_only_view())?;
    }

    if tree.validity(node).is_some_and(|v| v.contains(Validity::UNIQUE)) {
        if options.trusted {
            tree.clear_validity(node, Validity::UNIQUE)?;
        } else if work.push(node, UnresKind::UniqueLeaves) {
            tracing::debug!(node = %tree.path(node)?, "scheduled unique check");
        }
    }

    check_value_enabled(resolver, tree, node)?;

    if options.schedules_deferred() {
        let applies = resolver.applies_must(&schema, sid);
        if applies.has_must {
            work.push(node, UnresKind::Must);
        }
        if applies.has_must_inout {
            // queued once on the operation instance, not per payload child
            if let Some(operation) = tree.node(node)?.parent() {
                work.push(operation, UnresKind::MustInOut);
            }
        }
    }

    Ok(())
}

/// An action or notification nested in data encloses `id`.
fn inside_nested_operation(schema: &Schema, id: SchemaId) -> bool {
    std::iter::once(id)
        .chain(schema.ancestors(id))
        .filter(|a| matches!(schema.node(*a).kind(), NodeKind::Action | NodeKind::Notification))
        .any(|op| schema.data_parent(op).is_some())
}

/// Keys must be the first children of a list entry, in declared order.
fn check_keys(tree: &DataTree, schema: &Schema, node: NodeId, sid: SchemaId) -> Result<(), Error> {
    let children = tree.children(Some(node));
    for (position, key) in schema.node(sid).keys().iter().enumerate() {
        let at_position = children
            .get(position)
            .and_then(|c| tree.get(*c))
            .is_some_and(|c| c.schema() == *key);
        if at_position {
            continue;
        }

        let key_name = schema.node(*key).name();
        let present = children
            .iter()
            .any(|c| tree.get(*c).is_some_and(|n| n.schema() == *key));
        let error = if present {
            ValidationError::new(
                tree.path(node)?,
                ErrorCode::KeyOutOfOrder,
                format!("key '{}' is not at position {}", key_name, position + 1),
            )
        } else {
            ValidationError::new(
                tree.path(node)?,
                ErrorCode::MissingKey,
                format!("missing key '{}'", key_name),
            )
        };
        return Err(error.with_expected(key_name.to_string()).into());
    }
    Ok(())
}

fn check_single_instance(tree: &DataTree, node: NodeId, sid: SchemaId) -> Result<(), Error> {
    let parent = tree.node(node)?.parent();
    let other = tree
        .instances_of(parent, sid)
        .into_iter()
        .find(|other| *other != node);
    match other {
        Some(other) => Err(ValidationError::new(
            tree.path(node)?,
            ErrorCode::TooManyInstances,
            format!("'{}' may appear only once", tree.schema().node(sid).name()),
        )
        .with_related(tree.path(other)?)
        .into()),
        None => Ok(()),
    }
}

fn check_obsolete(
    options: &ValidationOptions,
    tree: &DataTree,
    schema: &Schema,
    node: NodeId,
    sid: SchemaId,
) -> Result<(), Error> {
    let obsolete_node = super::context::own_chain(schema, sid)
        .find(|s| schema.node(*s).status() == Status::Obsolete)
        .map(|s| format!("obsolete node '{}'", schema.node(s).name()));
    let obsolete_identity = tree.value(node).and_then(|v| match &v.item {
        ValueItem::Identity(identity) if identity.status == Status::Obsolete => {
            Some(format!("obsolete identity '{}'", identity.qualified_name()))
        }
        _ => None,
    });

    for what in obsolete_node.into_iter().chain(obsolete_identity) {
        if options.reject_obsolete {
            return Err(ValidationError::new(
                tree.path(node)?,
                ErrorCode::ObsoleteUsage,
                format!("use of {what}"),
            )
            .into());
        }
        tracing::warn!(node = %tree.path(node)?, "use of {}", what);
    }
    Ok(())
}

/// Enum, bit and identity values may be switched off by if-feature at any
/// time, so this runs on every pass.
fn check_value_enabled(resolver: &dyn Resolver, tree: &DataTree, node: NodeId) -> Result<(), Error> {
    let Some(value) = tree.value(node) else {
        return Ok(());
    };
    let enabled = |features: &[IfFeature]| {
        features.iter().all(|f| resolver.resolve_if_feature(f))
    };

    let disabled = match (&value.item, &value.ty.kind) {
        (ValueItem::Enum(index), TypeKind::Enumeration(entries)) => entries
            .get(*index)
            .filter(|e| !enabled(e.if_features.as_slice()))
            .map(|e| e.name.clone()),
        (ValueItem::Bits(indices), TypeKind::Bits(entries)) => indices
            .iter()
            .filter_map(|i| entries.get(*i))
            .find(|b| !enabled(b.if_features.as_slice()))
            .map(|b| b.name.clone()),
        (ValueItem::Identity(identity), _) => (!enabled(identity.if_features.as_slice()))
            .then(|| identity.qualified_name()),
        _ => None,
    };

    match disabled {
        Some(item) => Err(ValidationError::new(
            tree.path(node)?,
            ErrorCode::DisabledValue,
            format!("value '{}' is disabled by if-feature", item),
        )
        .with_got(value.canonical.clone())
        .into()),
        None => Ok(()),
    }
}
