//! Dispatch to extension plugins.

use std::sync::Arc;

use crate::data::{DataTree, DataValue, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::schema::{ExtValidation, ExtensionPlugin, ExtensionScope, TypeDef, TypeKind};

fn rejected(tree: &DataTree, node: NodeId, plugin: &dyn ExtensionPlugin) -> Result<Error, Error> {
    Ok(ValidationError::new(
        tree.path(node)?,
        ErrorCode::ExtensionRejected,
        format!("rejected by extension '{}'", plugin.name()),
    )
    .into())
}

fn run<'a>(
    tree: &DataTree,
    node: NodeId,
    plugins: impl IntoIterator<Item = &'a Arc<dyn ExtensionPlugin>>,
) -> Result<(), Error> {
    for plugin in plugins {
        if !plugin.valid_data(tree, node) {
            return Err(rejected(tree, node, plugin.as_ref())?);
        }
    }
    Ok(())
}

/// The type layers to consult for `value`, most specific first: the layers
/// of the member that accepted the value, then those of each enclosing
/// union, ending with the declared type. Only layers that request
/// validation are kept.
fn type_chain<'a>(ty: &'a TypeDef, accepted: &TypeDef, out: &mut Vec<&'a TypeDef>) {
    let member = ty
        .layers()
        .flat_map(|layer| layer.members())
        .find(|m| m.contains(accepted));
    if let Some(member) = member {
        type_chain(member, accepted, out);
    }
    out.extend(ty.layers().filter(|layer| layer.requests_validation()));
}

/// Plugins bound to one type layer that concern `value`: the layer itself,
/// its restrictions, and the enum or bit entries the value names.
fn layer_plugins<'a>(layer: &'a TypeDef, value: &DataValue) -> Vec<&'a Arc<dyn ExtensionPlugin>> {
    let mut plugins: Vec<&Arc<dyn ExtensionPlugin>> = layer.extensions.iter().collect();
    plugins.extend(layer.restrictions.iter().flat_map(|r| &r.extensions));
    match &layer.kind {
        TypeKind::Enumeration(entries) => plugins.extend(
            entries
                .iter()
                .filter(|e| e.name == value.canonical)
                .flat_map(|e| &e.extensions),
        ),
        TypeKind::Bits(entries) => {
            let set: Vec<&str> = value.canonical.split_whitespace().collect();
            plugins.extend(
                entries
                    .iter()
                    .filter(|b| set.contains(&b.name.as_str()))
                    .flat_map(|b| &b.extensions),
            );
        }
        _ => {}
    }
    plugins
}

/// Calls every plugin bound to `node`'s schema node and, for leaves, to the
/// type chain of its value.
pub(crate) fn validate_extensions(tree: &DataTree, node: NodeId) -> Result<(), Error> {
    let schema_node = tree.schema_node(node)?;
    if schema_node.ext_validation() == ExtValidation::None {
        return Ok(());
    }
    run(tree, node, schema_node.extensions())?;

    if let (Some(declared), Some(value)) = (schema_node.leaf_type(), tree.value(node)) {
        let mut chain = Vec::new();
        type_chain(declared, &value.ty, &mut chain);
        for layer in chain {
            run(tree, node, layer_plugins(layer, value))?;
        }
    }
    Ok(())
}

/// Re-runs subtree-scoped plugins of every ancestor of `node`.
pub(crate) fn validate_subtree_ancestors(tree: &DataTree, node: NodeId) -> Result<(), Error> {
    for ancestor in tree.ancestors(node) {
        let schema_node = tree.schema_node(ancestor)?;
        if schema_node.ext_validation() != ExtValidation::Subtree {
            continue;
        }
        let subtree = schema_node
            .extensions()
            .iter()
            .filter(|p| p.scope() == ExtensionScope::Subtree);
        run(tree, ancestor, subtree)?;
    }
    Ok(())
}
