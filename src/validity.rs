//! Per-node validity state.
//!
//! Every data node carries a [`Validity`] bitmask naming the constraint
//! categories that have not been checked yet. The mask is computed once when
//! the node is attached and bits are only ever cleared afterwards, each right
//! after the corresponding check passes. Only an explicit re-validation
//! (`DataTree::revalidate`) sets bits again.
//!
//! A node whose mask is [`Validity::OK`] is locally complete; it may still
//! have entries pending in the deferred work list.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::schema::{NodeKind, Schema, SchemaId};

/// Bitmask of unchecked constraint categories.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Validity(u8);

impl Validity {
    /// Nothing left to check.
    pub const OK: Validity = Validity(0);
    /// Key placement, instance count, status and extension checks.
    pub const MAND: Validity = Validity(1 << 0);
    /// `unique` statements of a list.
    pub const UNIQUE: Validity = Validity(1 << 1);
    /// Duplicate list/leaf-list instances.
    pub const DUP: Validity = Validity(1 << 2);
    /// Leafref target resolution.
    pub const LEAFREF: Validity = Validity(1 << 3);

    const NAMES: [(Validity, &'static str); 4] = [
        (Validity::MAND, "MAND"),
        (Validity::UNIQUE, "UNIQUE"),
        (Validity::DUP, "DUP"),
        (Validity::LEAFREF, "LEAFREF"),
    ];

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: Validity) -> bool {
        self.0 & other.0 == other.0 && !other.is_ok()
    }

    /// Clears the bits of `other`; clearing an already clear bit is a no-op.
    pub fn remove(&mut self, other: Validity) {
        self.0 &= !other.0;
    }
}

impl BitOr for Validity {
    type Output = Validity;

    fn bitor(self, rhs: Validity) -> Validity {
        Validity(self.0 | rhs.0)
    }
}

impl BitOrAssign for Validity {
    fn bitor_assign(&mut self, rhs: Validity) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "Validity(OK)");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Validity({})", names.join(" | "))
    }
}

/// Computes the mask a freshly attached instance of `id` starts with.
///
/// This depends on nothing but the schema node, so every instance of the same
/// schema node starts out identical.
pub fn initial_validity(schema: &Schema, id: SchemaId) -> Validity {
    let node = schema.node(id);
    let mut validity = Validity::OK;

    match node.kind() {
        NodeKind::Leaf | NodeKind::LeafList => {
            if node.leaf_type().is_some_and(|ty| ty.is_leafref_like()) {
                validity |= Validity::LEAFREF;
            }
            if node.kind() == NodeKind::LeafList {
                validity |= Validity::DUP;
            }
            validity |= Validity::MAND;
        }
        NodeKind::List => {
            validity |= Validity::DUP | Validity::MAND;
            if !node.uniques().is_empty() {
                validity |= Validity::UNIQUE;
            }
        }
        NodeKind::Container
        | NodeKind::AnyData
        | NodeKind::AnyXml
        | NodeKind::Rpc
        | NodeKind::Action
        | NodeKind::Notification => validity |= Validity::MAND,
        NodeKind::Choice | NodeKind::Case | NodeKind::Uses | NodeKind::Input | NodeKind::Output => {}
    }

    validity
}
