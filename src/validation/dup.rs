//! Duplicate-instance and `unique` detection among siblings.
//!
//! Both checks reduce every instance to a comparison key and look for two
//! equal keys. Two instances are compared directly; larger groups go through
//! a transient hash table keyed by a streaming hash of the comparison key,
//! where a hash hit is always confirmed by comparing the keys themselves.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::data::{DataTree, NodeId};
use crate::error::{Error, ErrorCode, ValidationError};
use crate::resolver::Resolver;
use crate::schema::{NodeKind, Schema, SchemaId, SchemaNode, YangVersion};
use crate::validity::Validity;

/// A hash table of instance indices, bucketed by key hash.
struct CollisionTable {
    state: RandomState,
    buckets: HashMap<u64, Vec<usize>, RandomState>,
}

impl CollisionTable {
    fn with_capacity(instances: usize) -> Result<Self, Error> {
        let mut buckets = HashMap::with_hasher(RandomState::new());
        buckets.try_reserve(instances.next_power_of_two())?;
        Ok(Self {
            state: RandomState::new(),
            buckets,
        })
    }

    /// Inserts `keys[index]`, returning an earlier index with an equal key.
    fn insert<K: Hash + Eq>(&mut self, keys: &[K], index: usize) -> Option<usize> {
        let key = &keys[index];
        let bucket = self.buckets.entry(BuildHasher::hash_one(&self.state, key)).or_default();
        if let Some(&earlier) = bucket.iter().find(|&&other| keys[other] == *key) {
            return Some(earlier);
        }
        bucket.push(index);
        None
    }
}

/// Finds the first pair of equal keys as `(earlier, later)`.
///
/// `None` keys take no part in the comparison.
fn first_collision<K: Hash + Eq>(keys: &[Option<K>]) -> Result<Option<(usize, usize)>, Error> {
    let present = keys.iter().filter(|k| k.is_some()).count();
    if present < 2 {
        return Ok(None);
    }

    if keys.len() == 2 {
        tracing::trace!(instances = 2, "pairwise comparison");
        return Ok((keys[0] == keys[1]).then_some((0, 1)));
    }

    tracing::trace!(instances = keys.len(), "hash table comparison");
    let mut table = CollisionTable::with_capacity(keys.len())?;
    for (index, key) in keys.iter().enumerate() {
        if key.is_none() {
            continue;
        }
        if let Some(earlier) = table.insert(keys, index) {
            return Ok(Some((earlier, index)));
        }
    }
    Ok(None)
}

/// Instances that may legitimately repeat.
fn exempt_from_dup(schema: &SchemaNode) -> bool {
    match schema.kind() {
        NodeKind::LeafList => !schema.is_config() && schema.module().version() >= YangVersion::V1_1,
        NodeKind::List => !schema.is_config() && schema.keys().is_empty(),
        _ => true,
    }
}

/// The values two instances must share to be duplicates.
///
/// A list entry with a missing key has no identity and compares with nothing.
fn dup_key(
    tree: &DataTree,
    schema: &Schema,
    node: NodeId,
) -> Result<Option<Vec<Option<String>>>, Error> {
    let sid = tree.node(node)?.schema();
    let schema_node = schema.node(sid);
    let canonical = |id: NodeId| tree.value(id).map(|v| v.canonical.clone());

    Ok(match schema_node.kind() {
        NodeKind::List if !schema_node.keys().is_empty() => {
            let key: Vec<Option<String>> = schema_node
                .keys()
                .iter()
                .map(|key| {
                    tree.instances_of(Some(node), *key)
                        .first()
                        .and_then(|k| canonical(*k))
                })
                .collect();
            if key.iter().any(Option::is_none) {
                None
            } else {
                Some(key)
            }
        }
        NodeKind::List => {
            // keyless lists compare their whole content
            let mut content = Vec::new();
            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                for child in tree.children(Some(current)).iter().rev() {
                    stack.push(*child);
                }
                if current != node {
                    let child_schema = tree.node(current)?.schema();
                    content.push(canonical(current).map(|v| {
                        format!("{}={}", schema.node(child_schema).name(), v)
                    }));
                }
            }
            Some(content)
        }
        _ => Some(vec![canonical(node)]),
    })
}

fn describe_key(tree: &DataTree, schema: &SchemaNode, key: &[Option<String>]) -> String {
    let values = key.iter().map(|v| v.as_deref().unwrap_or(""));
    match schema.kind() {
        NodeKind::List if !schema.keys().is_empty() => schema
            .keys()
            .iter()
            .zip(values)
            .map(|(k, v)| format!("{}='{}'", tree.schema().node(*k).name(), v))
            .collect::<Vec<_>>()
            .join(" "),
        _ => values.collect::<Vec<_>>().join(" "),
    }
}

/// Checks a group of sibling instances of one list or leaf-list schema node.
pub(crate) fn check_duplicates(tree: &DataTree, members: &[NodeId]) -> Result<(), Error> {
    let Some(first) = members.first() else {
        return Ok(());
    };
    let schema = tree.schema();
    let schema_node = tree.schema_node(*first)?;
    if exempt_from_dup(schema_node) {
        return Ok(());
    }

    let keys = members
        .iter()
        .map(|m| dup_key(tree, schema, *m))
        .collect::<Result<Vec<_>, Error>>()?;

    match first_collision(&keys)? {
        Some((earlier, later)) => {
            let key = keys[later].as_deref().unwrap_or_default();
            Err(ValidationError::new(
                tree.path(members[later])?,
                ErrorCode::DuplicateInstance,
                format!("duplicate instance of '{}'", schema_node.name()),
            )
            .with_related(tree.path(members[earlier])?)
            .with_got(describe_key(tree, schema_node, key))
            .into())
        }
        None => Ok(()),
    }
}

/// Runs duplicate detection for every list/leaf-list group under `parent`
/// that still has DUP pending, then clears DUP on the whole group.
///
/// In read-only views the bits are cleared without checking.
pub(crate) fn check_child_groups(
    tree: &mut DataTree,
    parent: Option<NodeId>,
    read_only_view: bool,
) -> Result<(), Error> {
    let mut groups: IndexMap<SchemaId, Vec<NodeId>> = IndexMap::new();
    for child in tree.children(parent) {
        let sid = tree.node(*child)?.schema();
        if matches!(tree.schema().node(sid).kind(), NodeKind::List | NodeKind::LeafList) {
            groups.entry(sid).or_default().push(*child);
        }
    }

    for members in groups.values() {
        let pending = members
            .iter()
            .any(|m| tree.validity(*m).is_some_and(|v| v.contains(Validity::DUP)));
        if !pending {
            continue;
        }
        if !read_only_view {
            check_duplicates(tree, members)?;
        }
        for member in members {
            tree.clear_validity(*member, Validity::DUP)?;
        }
    }
    Ok(())
}

/// Checks every `unique` statement of `node`'s list over all its sibling
/// instances, then clears UNIQUE on the whole group.
///
/// A referenced leaf that is absent takes its schema default; an instance
/// with an absent leaf and no default is left out of that statement only.
pub(crate) fn check_unique_group(
    tree: &mut DataTree,
    node: NodeId,
    resolver: &dyn Resolver,
) -> Result<(), Error> {
    let pending = tree
        .validity(node)
        .is_some_and(|v| v.contains(Validity::UNIQUE));
    if !pending {
        return Ok(());
    }

    let schema = Arc::clone(tree.schema());
    let data = tree.node(node)?;
    let sid = data.schema();
    let members = tree.instances_of(data.parent(), sid);
    let uniques = schema.node(sid).uniques();

    // one pass over the instances fills the keys of every statement
    let mut tuples: Vec<Vec<Option<Vec<String>>>> =
        vec![Vec::with_capacity(members.len()); uniques.len()];
    for member in &members {
        for (unique, keys) in uniques.iter().zip(tuples.iter_mut()) {
            let tuple = unique
                .paths
                .iter()
                .map(|path| resolver.resolve_descendant(tree, *member, path, true))
                .collect::<Option<Vec<String>>>();
            keys.push(tuple);
        }
    }

    let mut violation = None;
    for (unique, keys) in uniques.iter().zip(&tuples) {
        if let Some((earlier, later)) = first_collision(keys)? {
            violation = Some(ValidationError::new(
                tree.path(members[later])?,
                ErrorCode::NonUniqueCombination,
                format!("unique constraint \"{}\" violated", unique.expr),
            )
            .with_related(tree.path(members[earlier])?)
            .with_expected(unique.expr.clone())
            .with_got(keys[later].as_deref().unwrap_or_default().join(" ")));
            break;
        }
    }

    // settled for the whole group, violation or not
    for member in &members {
        tree.clear_validity(*member, Validity::UNIQUE)?;
    }
    match violation {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
