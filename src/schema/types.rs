//! Leaf and leaf-list types.
//!
//! A [`TypeDef`] is one layer of a type derivation chain. Each layer may carry
//! extension plugins of its own, as may its enum/bit entries and restrictions;
//! those are what the extension hook walks when a value is validated.

use std::fmt;
use std::sync::Arc;

use super::extension::ExtensionPlugin;
use super::module::{Identity, IfFeature};
use crate::unres::UnresKind;

/// The built-in type a layer resolves to.
#[derive(Clone)]
pub enum TypeKind {
    Binary,
    Bits(Vec<BitEntry>),
    Boolean,
    Decimal64,
    Empty,
    Enumeration(Vec<EnumEntry>),
    /// Identities accepted as values.
    IdentityRef(Vec<Arc<Identity>>),
    InstanceIdentifier,
    Int,
    Uint,
    String,
    Leafref {
        path: String,
    },
    Union(Vec<Arc<TypeDef>>),
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Binary => "binary",
            TypeKind::Bits(_) => "bits",
            TypeKind::Boolean => "boolean",
            TypeKind::Decimal64 => "decimal64",
            TypeKind::Empty => "empty",
            TypeKind::Enumeration(_) => "enumeration",
            TypeKind::IdentityRef(_) => "identityref",
            TypeKind::InstanceIdentifier => "instance-identifier",
            TypeKind::Int => "int64",
            TypeKind::Uint => "uint64",
            TypeKind::String => "string",
            TypeKind::Leafref { .. } => "leafref",
            TypeKind::Union(_) => "union",
        }
    }
}

/// One `enum` statement of an enumeration.
#[derive(Clone)]
pub struct EnumEntry {
    pub name: String,
    pub value: i32,
    pub if_features: Vec<IfFeature>,
    pub extensions: Vec<Arc<dyn ExtensionPlugin>>,
}

impl EnumEntry {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
            if_features: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn with_if_feature(mut self, expr: IfFeature) -> Self {
        self.if_features.push(expr);
        self
    }

    pub fn with_extension(mut self, ext: Arc<dyn ExtensionPlugin>) -> Self {
        self.extensions.push(ext);
        self
    }
}

/// One `bit` statement of a bits type.
#[derive(Clone)]
pub struct BitEntry {
    pub name: String,
    pub position: u32,
    pub if_features: Vec<IfFeature>,
    pub extensions: Vec<Arc<dyn ExtensionPlugin>>,
}

impl BitEntry {
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            position,
            if_features: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn with_if_feature(mut self, expr: IfFeature) -> Self {
        self.if_features.push(expr);
        self
    }

    pub fn with_extension(mut self, ext: Arc<dyn ExtensionPlugin>) -> Self {
        self.extensions.push(ext);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    Pattern,
    Range,
    Length,
}

/// A pattern, range or length restriction of a type layer.
///
/// Restrictions are enforced by the data parser; they appear here because
/// extension plugins may be bound to them.
#[derive(Clone)]
pub struct Restriction {
    pub kind: RestrictionKind,
    pub expr: String,
    pub extensions: Vec<Arc<dyn ExtensionPlugin>>,
}

impl Restriction {
    pub fn new(kind: RestrictionKind, expr: impl Into<String>) -> Self {
        Self {
            kind,
            expr: expr.into(),
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, ext: Arc<dyn ExtensionPlugin>) -> Self {
        self.extensions.push(ext);
        self
    }
}

/// One layer of a (possibly derived) type.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use yangcheck::schema::{TypeDef, TypeKind};
/// use yangcheck::UnresKind;
///
/// let name_ref = Arc::new(TypeDef::leafref("/ex:interfaces/ex:iface/ex:name"));
/// let either = TypeDef::union(vec![Arc::new(TypeDef::int()), name_ref]);
///
/// assert_eq!(either.deferred_kind(), Some(UnresKind::Union));
/// assert!(either.is_leafref_like());
/// ```
#[derive(Clone)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub base: Option<Arc<TypeDef>>,
    pub restrictions: Vec<Restriction>,
    pub extensions: Vec<Arc<dyn ExtensionPlugin>>,
}

impl TypeDef {
    /// Creates a built-in type layer.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            base: None,
            restrictions: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Creates a typedef layer on top of `base`, inheriting its kind.
    pub fn derive(name: impl Into<String>, base: &Arc<TypeDef>) -> Self {
        Self {
            name: name.into(),
            kind: base.kind.clone(),
            base: Some(Arc::clone(base)),
            restrictions: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn int() -> Self {
        Self::new(TypeKind::Int)
    }

    pub fn uint() -> Self {
        Self::new(TypeKind::Uint)
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn empty() -> Self {
        Self::new(TypeKind::Empty)
    }

    pub fn leafref(path: impl Into<String>) -> Self {
        Self::new(TypeKind::Leafref { path: path.into() })
    }

    pub fn instance_identifier() -> Self {
        Self::new(TypeKind::InstanceIdentifier)
    }

    pub fn enumeration(entries: Vec<EnumEntry>) -> Self {
        Self::new(TypeKind::Enumeration(entries))
    }

    pub fn bits(entries: Vec<BitEntry>) -> Self {
        Self::new(TypeKind::Bits(entries))
    }

    pub fn identityref(identities: Vec<Arc<Identity>>) -> Self {
        Self::new(TypeKind::IdentityRef(identities))
    }

    pub fn union(members: Vec<Arc<TypeDef>>) -> Self {
        Self::new(TypeKind::Union(members))
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn with_extension(mut self, ext: Arc<dyn ExtensionPlugin>) -> Self {
        self.extensions.push(ext);
        self
    }

    /// Iterates this layer followed by each base layer, most derived first.
    pub fn layers(&self) -> impl Iterator<Item = &TypeDef> {
        std::iter::successors(Some(self), |ty| ty.base.as_deref())
    }

    /// Union members of this layer (empty for non-unions).
    pub fn members(&self) -> &[Arc<TypeDef>] {
        match &self.kind {
            TypeKind::Union(members) => members,
            _ => &[],
        }
    }

    /// Returns the deferred check a value of this type needs, if any.
    pub fn deferred_kind(&self) -> Option<UnresKind> {
        match &self.kind {
            TypeKind::Leafref { .. } => Some(UnresKind::Leafref),
            TypeKind::InstanceIdentifier => Some(UnresKind::InstanceId),
            TypeKind::Union(members) if members.iter().any(|m| m.has_pointer()) => {
                Some(UnresKind::Union)
            }
            _ => None,
        }
    }

    /// True for leafrefs, instance-identifiers and unions containing either.
    pub fn has_pointer(&self) -> bool {
        match &self.kind {
            TypeKind::Leafref { .. } | TypeKind::InstanceIdentifier => true,
            TypeKind::Union(members) => members.iter().any(|m| m.has_pointer()),
            _ => false,
        }
    }

    /// True for leafrefs and unions with a leafref member.
    pub fn is_leafref_like(&self) -> bool {
        match &self.kind {
            TypeKind::Leafref { .. } => true,
            TypeKind::Union(members) => members.iter().any(|m| m.is_leafref_like()),
            _ => false,
        }
    }

    /// Returns the leafref path of this type, if it is a leafref.
    pub fn leafref_path(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Leafref { path } => Some(path),
            _ => None,
        }
    }

    /// True if this single layer has any extension bound to it, its entries
    /// or its restrictions.
    pub fn requests_validation(&self) -> bool {
        let entries = match &self.kind {
            TypeKind::Enumeration(entries) => entries.iter().any(|e| !e.extensions.is_empty()),
            TypeKind::Bits(entries) => entries.iter().any(|b| !b.extensions.is_empty()),
            _ => false,
        };
        entries
            || !self.extensions.is_empty()
            || self.restrictions.iter().any(|r| !r.extensions.is_empty())
    }

    /// True if any layer of the chain, or any union member, requests validation.
    pub fn chain_requests_validation(&self) -> bool {
        self.layers().any(|layer| {
            layer.requests_validation()
                || layer.members().iter().any(|m| m.chain_requests_validation())
        })
    }

    /// Calls `f` on every extension plugin reachable from this type.
    pub(crate) fn for_each_extension(&self, f: &mut dyn FnMut(&Arc<dyn ExtensionPlugin>)) {
        for layer in self.layers() {
            layer.extensions.iter().for_each(&mut *f);
            for r in &layer.restrictions {
                r.extensions.iter().for_each(&mut *f);
            }
            match &layer.kind {
                TypeKind::Enumeration(entries) => {
                    entries.iter().flat_map(|e| &e.extensions).for_each(&mut *f)
                }
                TypeKind::Bits(entries) => {
                    entries.iter().flat_map(|b| &b.extensions).for_each(&mut *f)
                }
                TypeKind::Union(members) => {
                    for m in members {
                        m.for_each_extension(f);
                    }
                }
                _ => {}
            }
        }
    }

    /// True if `target` is this layer or is reachable through union members.
    pub fn contains(&self, target: &TypeDef) -> bool {
        std::ptr::eq(self, target) || self.members().iter().any(|m| m.contains(target))
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("base", &self.base.as_ref().map(|b| &b.name))
            .finish_non_exhaustive()
    }
}
