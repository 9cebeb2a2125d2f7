//! Error types for validation failures.
//!
//! This module separates *invalid data* ([`ValidationError`], accumulated into
//! [`ValidationErrors`]) from failures of the validator itself ([`Error`]).

mod validation_error;

pub use validation_error::{Error, ErrorClass, ErrorCode, ValidationError, ValidationErrors};
