//! Typed leaf values.
//!
//! Values reach the validator already parsed; [`DataValue::parse`] is the
//! minimal parser the data tree uses to attach leaves. It records the
//! canonical text, the concrete type layer that accepted the value (the
//! member type for unions) and, for enumerations, bits and identityrefs, the
//! schema item the value names.

use std::sync::Arc;

use crate::path::DataPath;
use crate::schema::{Identity, TypeDef, TypeKind};

/// The schema item an enum, bits or identityref value refers to.
#[derive(Debug, Clone)]
pub enum ValueItem {
    Plain,
    /// Index into the enumeration's entries.
    Enum(usize),
    /// Indices into the bits type's entries, sorted by position.
    Bits(Vec<usize>),
    Identity(Arc<Identity>),
}

/// A parsed leaf or leaf-list value.
#[derive(Debug, Clone)]
pub struct DataValue {
    /// Canonical textual form; equality of values is equality of this text.
    pub canonical: String,
    /// The type layer that accepted the value.
    pub ty: Arc<TypeDef>,
    pub item: ValueItem,
}

impl DataValue {
    /// Parses `text` as a value of `ty`.
    ///
    /// Union members are tried in order and the first one that accepts the
    /// text wins.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::Invalid` if no (member) type accepts the text.
    pub fn parse(ty: &Arc<TypeDef>, text: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::Invalid {
            ty: ty.name.clone(),
            value: text.to_string(),
        };

        let (canonical, item) = match &ty.kind {
            TypeKind::Union(members) => {
                return members
                    .iter()
                    .find_map(|m| DataValue::parse(m, text).ok())
                    .ok_or_else(invalid);
            }
            TypeKind::String | TypeKind::Binary | TypeKind::Leafref { .. } => {
                (text.to_string(), ValueItem::Plain)
            }
            TypeKind::Int => {
                let v: i64 = text.trim().parse().map_err(|_| invalid())?;
                (v.to_string(), ValueItem::Plain)
            }
            TypeKind::Uint => {
                let v: u64 = text.trim().parse().map_err(|_| invalid())?;
                (v.to_string(), ValueItem::Plain)
            }
            TypeKind::Decimal64 => {
                let v: f64 = text.trim().parse().map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                (text.trim().to_string(), ValueItem::Plain)
            }
            TypeKind::Boolean => match text.trim() {
                "true" | "false" => (text.trim().to_string(), ValueItem::Plain),
                _ => return Err(invalid()),
            },
            TypeKind::Empty => {
                if !text.is_empty() {
                    return Err(invalid());
                }
                (String::new(), ValueItem::Plain)
            }
            TypeKind::Enumeration(entries) => {
                let index = entries
                    .iter()
                    .position(|e| e.name == text.trim())
                    .ok_or_else(invalid)?;
                (entries[index].name.clone(), ValueItem::Enum(index))
            }
            TypeKind::Bits(entries) => {
                let mut indices = Vec::new();
                for name in text.split_whitespace() {
                    let index = entries
                        .iter()
                        .position(|b| b.name == name)
                        .ok_or_else(invalid)?;
                    if !indices.contains(&index) {
                        indices.push(index);
                    }
                }
                indices.sort_by_key(|i| entries[*i].position);
                let canonical: Vec<&str> =
                    indices.iter().map(|i| entries[*i].name.as_str()).collect();
                (canonical.join(" "), ValueItem::Bits(indices))
            }
            TypeKind::IdentityRef(identities) => {
                let text = text.trim();
                let (module, name) = match text.split_once(':') {
                    Some((module, name)) => (Some(module), name),
                    None => (None, text),
                };
                let identity = identities
                    .iter()
                    .find(|i| i.name == name && module.map_or(true, |m| m == i.module.name()))
                    .ok_or_else(invalid)?;
                (
                    identity.qualified_name(),
                    ValueItem::Identity(Arc::clone(identity)),
                )
            }
            TypeKind::InstanceIdentifier => {
                text.parse::<DataPath>().map_err(|_| invalid())?;
                (text.trim().to_string(), ValueItem::Plain)
            }
        };

        Ok(Self {
            canonical,
            ty: Arc::clone(ty),
            item,
        })
    }

    /// The enum entry name, bit names or identity the value refers to.
    pub fn item(&self) -> &ValueItem {
        &self.item
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for DataValue {}

/// Errors raised while parsing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid value '{value}' for type '{ty}'")]
    Invalid { ty: String, value: String },
}
