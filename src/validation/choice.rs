//! Case exclusivity of choices.
//!
//! Data may arrive in any order, so a node attached later can conflict with
//! siblings attached earlier. The check therefore runs per node rather than
//! once per parent.

use std::sync::Arc;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};

/// Makes sure no sibling of `node` belongs to a different case of any choice
/// enclosing `node` (nested choices included).
///
/// With `autodelete`, conflicting siblings are removed; the instance named by
/// `inserted` is never removed, a conflict with it is reported instead.
pub(crate) fn enforce_exclusive_case(
    tree: &mut DataTree,
    node: NodeId,
    inserted: Option<NodeId>,
    autodelete: bool,
) -> Result<(), Error> {
    let schema = Arc::clone(tree.schema());
    let data = tree.node(node)?;
    let parent = data.parent();
    let mut current = data.schema();

    while let Some((choice, case)) = schema.choice_context(current) {
        let conflicts: Vec<NodeId> = tree
            .children(parent)
            .iter()
            .copied()
            .filter(|sibling| *sibling != node)
            .filter(|sibling| {
                tree.get(*sibling)
                    .and_then(|s| schema.case_within(s.schema(), choice))
                    .is_some_and(|other| other != case)
            })
            .collect();

        for sibling in conflicts {
            if !autodelete || Some(sibling) == inserted {
                return Err(ValidationError::new(
                    tree.path(node)?,
                    ErrorCode::MultipleCasesInstantiated,
                    format!(
                        "data from more than one case of choice '{}'",
                        schema.node(choice).name()
                    ),
                )
                .with_related(tree.path(sibling)?)
                .into());
            }
            tracing::debug!(
                choice = schema.node(choice).name(),
                removed = %tree.path(sibling)?,
                "removing instance of a conflicting case"
            );
            tree.remove(sibling)?;
        }

        current = choice;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Module, NodeDef, Schema, SchemaId, TypeDef, YangVersion};

    struct Fixture {
        tree: DataTree,
        top: NodeId,
        x: SchemaId,
        y: SchemaId,
        z: SchemaId,
    }

    // top { choice outer { case a { choice inner { leaf x; leaf y; } } leaf z; } }
    fn fixture() -> Fixture {
        let ex = Module::new("ex", YangVersion::V1_1).into_shared();
        let string = Arc::new(TypeDef::string());
        let mut b = Schema::builder();
        let top = b.add(None, &ex, NodeDef::container("top"));
        let outer = b.add(Some(top), &ex, NodeDef::choice("outer"));
        let a = b.add(Some(outer), &ex, NodeDef::case("a"));
        let inner = b.add(Some(a), &ex, NodeDef::choice("inner"));
        let x = b.add(Some(inner), &ex, NodeDef::leaf("x", Arc::clone(&string)));
        let y = b.add(Some(inner), &ex, NodeDef::leaf("y", Arc::clone(&string)));
        let z = b.add(Some(outer), &ex, NodeDef::leaf("z", string));
        let mut tree = DataTree::new(Arc::new(b.build().unwrap()));
        let top = tree.insert_inner(None, top).unwrap();
        Fixture { tree, top, x, y, z }
    }

    #[test]
    fn test_autodelete_keeps_latest_case() {
        let mut f = fixture();
        let x = f.tree.insert_leaf(Some(f.top), f.x, "1").unwrap();
        enforce_exclusive_case(&mut f.tree, x, Some(x), true).unwrap();
        let y = f.tree.insert_leaf(Some(f.top), f.y, "2").unwrap();
        enforce_exclusive_case(&mut f.tree, y, Some(y), true).unwrap();

        assert!(!f.tree.contains(x));
        assert_eq!(f.tree.children(Some(f.top)), &[y]);
    }

    #[test]
    fn test_nested_choice_conflicts_with_outer_case() {
        let mut f = fixture();
        let z = f.tree.insert_leaf(Some(f.top), f.z, "1").unwrap();
        let x = f.tree.insert_leaf(Some(f.top), f.x, "2").unwrap();
        enforce_exclusive_case(&mut f.tree, x, Some(x), true).unwrap();
        assert!(!f.tree.contains(z));
        assert!(f.tree.contains(x));
    }

    #[test]
    fn test_strict_mode_rejects() {
        let mut f = fixture();
        let x = f.tree.insert_leaf(Some(f.top), f.x, "1").unwrap();
        let y = f.tree.insert_leaf(Some(f.top), f.y, "2").unwrap();
        let err = enforce_exclusive_case(&mut f.tree, y, Some(y), false).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.code, ErrorCode::MultipleCasesInstantiated);
        assert_eq!(violation.related, vec![f.tree.path(x).unwrap()]);
        assert!(f.tree.contains(x));
    }

    #[test]
    fn test_conflict_with_inserted_node_is_reported() {
        let mut f = fixture();
        let x = f.tree.insert_leaf(Some(f.top), f.x, "1").unwrap();
        let y = f.tree.insert_leaf(Some(f.top), f.y, "2").unwrap();
        let err = enforce_exclusive_case(&mut f.tree, x, Some(y), true).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MultipleCasesInstantiated));
        assert!(f.tree.contains(y));
    }
}
