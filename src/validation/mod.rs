//! Request parameter validation.
//!
//! # Data Flow
//! ```text
//! query string pairs / JSON body scalars
//!     → RawParams (untyped, multi-valued)
//!     → Coercer (string → integer/boolean/enum, range checks)
//!     → typed request struct, or ValidationError listing every bad field
//! ```
//!
//! # Design Decisions
//! - Fail closed: a value that does not coerce is rejected, never defaulted
//! - Unknown keys are ignored
//! - Parameters are flat scalars; repeated keys and nested JSON are type errors

pub mod coerce;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use coerce::{Coercer, RawParams};

/// One offending field and what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Raw input failed type, range, or presence checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{object_name} is invalid: {}", join_errors(.errors))]
pub struct ValidationError {
    /// Name of the validated shape, e.g. `ImageTransformOptions`.
    pub object_name: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// A validation error about a single field.
    pub fn field(object_name: &'static str, field: &str, message: impl Into<String>) -> Self {
        Self {
            object_name,
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    /// Whether `field` is among the offending fields.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_all_fields() {
        let err = ValidationError {
            object_name: "Thing",
            errors: vec![
                FieldError { field: "a".into(), message: "must be integer".into() },
                FieldError { field: "b".into(), message: "is required".into() },
            ],
        };
        assert_eq!(err.to_string(), "Thing is invalid: a must be integer; b is required");
        assert!(err.has_field("b"));
        assert!(!err.has_field("c"));
    }
}
