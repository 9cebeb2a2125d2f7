//! Deferred work items.
//!
//! Checks that need the whole tree (or an XPath context) cannot run while a
//! node is being attached. The validator records them in a caller-owned
//! [`WorkList`], which is drained later in enqueue order.

use indexmap::IndexSet;

use crate::data::NodeId;

/// The kind of a deferred check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnresKind {
    /// Leafref target must exist.
    Leafref,
    /// Instance-identifier target must exist.
    InstanceId,
    /// Union value whose accepted member may be a leafref or instance-identifier.
    Union,
    /// `when` condition of the node.
    When,
    /// `must` conditions of the node itself.
    Must,
    /// `must` conditions on the input/output of an RPC or action, queued on
    /// the operation instance.
    MustInOut,
    /// `unique` statements over the node's whole list instance set.
    UniqueLeaves,
}

/// One deferred check on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnresItem {
    pub node: NodeId,
    pub kind: UnresKind,
}

impl UnresItem {
    pub fn new(node: NodeId, kind: UnresKind) -> Self {
        Self { node, kind }
    }
}

/// An insertion-ordered queue of deferred checks.
///
/// A `(node, kind)` pair that is still pending is never queued twice.
///
/// # Example
///
/// ```rust
/// use yangcheck::data::NodeId;
/// use yangcheck::{UnresKind, WorkList};
///
/// let mut work = WorkList::new();
/// let node = NodeId::from_index(3);
/// assert!(work.push(node, UnresKind::Leafref));
/// assert!(!work.push(node, UnresKind::Leafref));
/// assert!(work.push(node, UnresKind::When));
///
/// let drained = work.drain();
/// assert_eq!(drained.len(), 2);
/// assert!(work.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkList {
    items: IndexSet<UnresItem>,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a check; returns false if the same check is already pending.
    pub fn push(&mut self, node: NodeId, kind: UnresKind) -> bool {
        self.items.insert(UnresItem::new(node, kind))
    }

    pub fn contains(&self, node: NodeId, kind: UnresKind) -> bool {
        self.items.contains(&UnresItem::new(node, kind))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnresItem> {
        self.items.iter()
    }

    /// Number of pending checks of `kind`.
    pub fn count(&self, kind: UnresKind) -> usize {
        self.items.iter().filter(|i| i.kind == kind).count()
    }

    /// Removes and returns all pending checks in enqueue order.
    pub fn drain(&mut self) -> Vec<UnresItem> {
        self.items.drain(..).collect()
    }

    /// Drops every pending check on nodes rejected by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.items.retain(|item| keep(item.node));
    }
}
