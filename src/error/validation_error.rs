//! Validation error types.
//!
//! This module provides [`ValidationError`] for single constraint violations,
//! [`ValidationErrors`] for accumulating multiple violations across a tree, and
//! the tri-state [`Error`] returned by per-node validator calls.

use std::fmt::{self, Display};

use stillwater::prelude::*;

use crate::path::DataPath;

/// Machine-readable category of a constraint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A mandatory leaf, choice or anydata node is missing.
    MissingMandatory,
    /// A list instance lacks one of its keys.
    MissingKey,
    /// A list key is not placed at its declared position.
    KeyOutOfOrder,
    /// Two list/leaf-list instances are equal.
    DuplicateInstance,
    /// Two list instances share the values of a `unique` statement.
    NonUniqueCombination,
    /// A single-instance node repeats, or max-elements is exceeded.
    TooManyInstances,
    /// Fewer instances than min-elements.
    TooFewInstances,
    /// The node is disabled by an unsatisfied if-feature.
    DisabledNode,
    /// An enum, bit or identity value is disabled by an unsatisfied if-feature.
    DisabledValue,
    /// State data appears where only configuration is allowed.
    ReadOnlyInEditableContext,
    /// An RPC/action payload element precedes a sibling it must follow.
    OutOfOrderElement,
    /// Nodes from more than one case of a choice are instantiated.
    MultipleCasesInstantiated,
    /// An obsolete schema node or identity is used.
    ObsoleteUsage,
    /// An extension plugin rejected the data.
    ExtensionRejected,
    /// A leafref value has no matching target instance.
    LeafrefUnresolved,
    /// An instance-identifier points to no existing instance.
    InstanceIdUnresolved,
    /// A must expression evaluated to false.
    MustViolation,
    /// A when expression evaluated to false for an existing node.
    WhenViolation,
    /// A deferred check could not be completed.
    Unresolved,
}

impl ErrorCode {
    /// Returns the snake_case identifier of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingMandatory => "missing_mandatory",
            ErrorCode::MissingKey => "missing_key",
            ErrorCode::KeyOutOfOrder => "key_out_of_order",
            ErrorCode::DuplicateInstance => "duplicate_instance",
            ErrorCode::NonUniqueCombination => "non_unique_combination",
            ErrorCode::TooManyInstances => "too_many_instances",
            ErrorCode::TooFewInstances => "too_few_instances",
            ErrorCode::DisabledNode => "disabled_node",
            ErrorCode::DisabledValue => "disabled_value",
            ErrorCode::ReadOnlyInEditableContext => "read_only_in_editable_context",
            ErrorCode::OutOfOrderElement => "out_of_order_element",
            ErrorCode::MultipleCasesInstantiated => "multiple_cases_instantiated",
            ErrorCode::ObsoleteUsage => "obsolete_usage",
            ErrorCode::ExtensionRejected => "extension_rejected",
            ErrorCode::LeafrefUnresolved => "leafref_unresolved",
            ErrorCode::InstanceIdUnresolved => "instance_id_unresolved",
            ErrorCode::MustViolation => "must_violation",
            ErrorCode::WhenViolation => "when_violation",
            ErrorCode::Unresolved => "unresolved",
        }
    }

    /// Returns the severity class of this code.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::ExtensionRejected => ErrorClass::ExtensionRejected,
            _ => ErrorClass::SchemaViolation,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad class of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The data breaks a constraint declared in the schema.
    SchemaViolation,
    /// A plugin-defined rule rejected the data.
    ExtensionRejected,
}

/// A single constraint violation with full context.
///
/// - **path**: the instance that failed validation
/// - **related**: other instances involved (e.g. the earlier duplicate)
/// - **message**: human-readable description of the failure
/// - **got** / **expected**: optional detail on the offending value
/// - **code**: machine-readable [`ErrorCode`]
///
/// # Example
///
/// ```rust
/// use yangcheck::{DataPath, ErrorCode, ValidationError};
///
/// let first = DataPath::root().push_node(Some("ex"), "iface").push_key("name", "eth0");
/// let error = ValidationError::new(first.clone(), ErrorCode::DuplicateInstance, "duplicate instance")
///     .with_related(first)
///     .with_got("eth0");
///
/// assert_eq!(error.code, ErrorCode::DuplicateInstance);
/// assert_eq!(error.related.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The path to the instance that failed validation.
    pub path: DataPath,
    /// Paths of other instances taking part in the violation.
    pub related: Vec<DataPath>,
    /// Human-readable error message.
    pub message: String,
    /// The actual value that was received (formatted as string).
    pub got: Option<String>,
    /// Description of what was expected.
    pub expected: Option<String>,
    /// Machine-readable error code.
    pub code: ErrorCode,
}

impl ValidationError {
    /// Creates a new error for the given instance.
    pub fn new(path: DataPath, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            path,
            related: Vec::new(),
            message: message.into(),
            got: None,
            expected: None,
            code,
        }
    }

    /// Adds a related instance path and returns self for chaining.
    pub fn with_related(mut self, path: DataPath) -> Self {
        self.related.push(path);
        self
    }

    /// Sets the "got" (actual value) field and returns self for chaining.
    pub fn with_got(mut self, got: impl Into<String>) -> Self {
        self.got = Some(got.into());
        self
    }

    /// Sets the "expected" field and returns self for chaining.
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Returns the severity class of this violation.
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;

        if !self.related.is_empty() {
            let related: Vec<String> = self.related.iter().map(ToString::to_string).collect();
            write!(f, " (see: {})", related.join(", "))?;
        }
        if let Some(ref expected) = self.expected {
            write!(f, " (expected: {})", expected)?;
        }
        if let Some(ref got) = self.got {
            write!(f, " (got: {})", got)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationError>();
    assert_sync::<ValidationError>();
};

/// A non-empty collection of violations gathered across a data tree.
///
/// `ValidationErrors` wraps a `NonEmptyVec<ValidationError>` so that a
/// `Validation<T, ValidationErrors>` failure always carries at least one error.
/// Errors from separate nodes combine through `Semigroup`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(NonEmptyVec<ValidationError>);

impl ValidationErrors {
    /// Creates a `ValidationErrors` containing a single error.
    pub fn single(error: ValidationError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Creates a `ValidationErrors` from a `Vec`, or `None` if it is empty.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        let mut errors = errors.into_iter();
        let head = Self::single(errors.next()?);
        Some(errors.fold(head, |acc, e| acc.combine(Self::single(e))))
    }

    /// Returns the number of errors in this collection.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the collection is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over the contained errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns the first error in the collection.
    pub fn first(&self) -> &ValidationError {
        self.0.head()
    }

    /// Returns all errors with the specified code.
    pub fn with_code(&self, code: ErrorCode) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.code == code).collect()
    }

    /// Returns all errors at the specified path.
    pub fn at_path(&self, path: &DataPath) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| &e.path == path).collect()
    }

    /// Converts this collection into a `Vec<ValidationError>`.
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0.into_vec()
    }
}

impl Semigroup for ValidationErrors {
    fn combine(self, other: Self) -> Self {
        ValidationErrors(self.0.combine(other.0))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

/// Outcome of a failed validator call.
///
/// `Invalid` means the data breaks a constraint; `Resource` and `Internal`
/// mean the validator could not do its job and say nothing about the data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The data violates a schema constraint or an extension rule.
    #[error("{0}")]
    Invalid(Box<ValidationError>),

    /// Memory for a transient table or copy could not be reserved.
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// A collaborator failed or an unsupported construct was met.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps a violation.
    pub fn invalid(error: ValidationError) -> Self {
        Error::Invalid(Box::new(error))
    }

    /// Returns the violation, if this error is one.
    pub fn violation(&self) -> Option<&ValidationError> {
        match self {
            Error::Invalid(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the violation code, if this error is one.
    pub fn code(&self) -> Option<ErrorCode> {
        self.violation().map(|e| e.code)
    }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        Error::invalid(error)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(error: std::collections::TryReserveError) -> Self {
        Error::Resource(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(name: &str) -> DataPath {
        DataPath::root().push_node(Some("ex"), name)
    }

    #[test]
    fn test_error_creation() {
        let error = ValidationError::new(path("a"), ErrorCode::MissingKey, "missing key");

        assert_eq!(error.path, path("a"));
        assert_eq!(error.code, ErrorCode::MissingKey);
        assert!(error.related.is_empty());
        assert!(error.got.is_none());
        assert!(error.expected.is_none());
        assert_eq!(error.class(), ErrorClass::SchemaViolation);
    }

    #[test]
    fn test_error_display_lists_related_paths() {
        let error = ValidationError::new(path("b"), ErrorCode::DuplicateInstance, "duplicate")
            .with_related(path("a"))
            .with_expected("distinct keys");

        let display = error.to_string();
        assert!(display.starts_with("/ex:b: duplicate"));
        assert!(display.contains("see: /ex:a"));
        assert!(display.contains("expected: distinct keys"));
    }

    #[test]
    fn test_extension_class() {
        let error = ValidationError::new(path("a"), ErrorCode::ExtensionRejected, "rejected");
        assert_eq!(error.class(), ErrorClass::ExtensionRejected);
        assert_eq!(ErrorCode::ExtensionRejected.to_string(), "extension_rejected");
    }

    #[test]
    fn test_errors_combine_and_filter() {
        let e1 = ValidationErrors::single(ValidationError::new(
            path("a"),
            ErrorCode::MissingMandatory,
            "1",
        ));
        let e2 = ValidationErrors::single(ValidationError::new(
            path("b"),
            ErrorCode::TooFewInstances,
            "2",
        ));
        let e3 = ValidationErrors::single(ValidationError::new(
            path("a"),
            ErrorCode::MissingMandatory,
            "3",
        ));

        let combined = e1.combine(e2).combine(e3);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.with_code(ErrorCode::MissingMandatory).len(), 2);
        assert_eq!(combined.at_path(&path("b")).len(), 1);
        assert_eq!(combined.first().message, "1");
        assert!(combined.to_string().contains("3 error(s)"));
    }

    #[test]
    fn test_from_empty_vec_is_none() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn test_error_tri_state() {
        let err: Error =
            ValidationError::new(path("a"), ErrorCode::DisabledNode, "disabled").into();
        assert_eq!(err.code(), Some(ErrorCode::DisabledNode));

        let err = Error::Internal("no evaluator".to_string());
        assert!(err.violation().is_none());
        assert!(err.to_string().contains("no evaluator"));
    }
}
