//! # Yangcheck
//!
//! Semantic validation of YANG instance-data trees against their compiled
//! schema.
//!
//! ## Overview
//!
//! A [`schema::Schema`] is built once and shared read-only. Data trees
//! ([`data::DataTree`]) are built against it, and a [`Validator`] checks
//! them in one of several [`ValidationMode`]s: plain data, configuration,
//! edit payloads, filters, get replies, RPC and action input or output, and
//! notifications.
//!
//! Checks that need the rest of the tree (leafref and instance-identifier
//! targets, `must` and `when` expressions, `unique` groups) are not run in
//! place. They are recorded in a [`WorkList`] and decided once the tree is
//! complete by [`Validator::resolve_deferred`].
//!
//! Whole-tree validation accumulates every violation it finds rather than
//! stopping at the first one. This uses stillwater's `Validation` type.
//!
//! ## Core Types
//!
//! - [`DataPath`]: a data-node path such as `/ex:interfaces/iface[name='eth0']`
//! - [`ValidationError`]: one violation, with its path, code and related nodes
//! - [`ValidationErrors`]: a non-empty collection of violations
//! - [`Error`]: a violation, an allocation failure or an internal error
//! - [`Validator`]: the entry point for validation
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yangcheck::data::DataTree;
//! use yangcheck::schema::{Module, NodeDef, Schema, TypeDef, YangVersion};
//! use yangcheck::{ValidationOptions, Validator};
//!
//! let ex = Module::new("ex", YangVersion::V1_1).into_shared();
//! let mut builder = Schema::builder();
//! let system = builder.add(None, &ex, NodeDef::presence_container("system"));
//! builder.add(
//!     Some(system),
//!     &ex,
//!     NodeDef::leaf("hostname", Arc::new(TypeDef::string())).mandatory(true),
//! );
//! let schema = Arc::new(builder.build().unwrap());
//!
//! let validator = Validator::new(ValidationOptions::default());
//!
//! // Without the presence container nothing is mandatory.
//! let mut tree = DataTree::new(Arc::clone(&schema));
//! assert!(validator.validate_tree(&mut tree).unwrap().is_success());
//!
//! // Once the container exists, its mandatory leaf must exist too.
//! tree.insert_inner(None, system).unwrap();
//! assert!(validator.validate_tree(&mut tree).unwrap().is_failure());
//! ```

pub mod data;
pub mod error;
pub mod path;
pub mod resolver;
pub mod schema;
pub mod unres;
pub mod validation;
pub mod validity;

pub use error::{Error, ErrorClass, ErrorCode, ValidationError, ValidationErrors};
pub use path::{DataPath, PathSegment};
pub use resolver::{MustApplicability, PathResolver, Resolution, Resolver, XPathEvaluator};
pub use unres::{UnresItem, UnresKind, WorkList};
pub use validation::{ValidationMode, ValidationOptions, Validator};
pub use validity::Validity;

/// Type alias for validation results using ValidationErrors
pub type ValidationResult<T> = stillwater::Validation<T, ValidationErrors>;
