//! Canonical encoding and aggregate validation.
//!
//! Every record version serializes through [`canonical_json`]: defaults are
//! applied structurally by the record types, and object keys come out in
//! lexicographic order, so two logically equal records always produce the
//! same bytes and therefore the same digest.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// One violated field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field, e.g. `backend_ports` or
    /// `health_checks[0].port`.
    pub field: String,
    /// What the constraint required.
    pub message: String,
}

impl Violation {
    /// Build a violation for a field.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every constraint a payload violated, reported together.
///
/// Validation never stops at the first offending field: callers reacting to
/// a failure need the complete list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// The violated constraints, in field order.
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    /// A failure with a single violation.
    pub fn of(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(field, message)],
        }
    }

    /// Whether a particular field is among the violations.
    pub fn names(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload validation failed: ")?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Accumulator used by record validation.
#[derive(Debug, Default)]
pub struct Violations(Vec<Violation>);

impl Violations {
    /// Record a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(field, message));
    }

    /// Fold another failure in under a field prefix (nested records).
    pub fn extend_nested(&mut self, prefix: &str, failure: ValidationFailure) {
        for violation in failure.violations {
            self.0
                .push(Violation::new(format!("{prefix}.{}", violation.field), violation.message));
        }
    }

    /// Succeed if nothing was recorded, fail with the aggregate otherwise.
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { violations: self.0 })
        }
    }
}

/// Serialize a payload to its canonical textual form.
///
/// Goes through `serde_json::Value` so that object keys are emitted in
/// sorted order regardless of struct field declaration order.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ValidationFailure> {
    let value = serde_json::to_value(value)
        .map_err(|err| ValidationFailure::of("payload", err.to_string()))?;
    serde_json::to_string(&value).map_err(|err| ValidationFailure::of("payload", err.to_string()))
}

/// Parse canonical text into a payload type.
///
/// Unknown fields and structural type mismatches surface as a validation
/// failure carrying serde's field-naming message; constraint validation is
/// the record type's job afterwards.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ValidationFailure> {
    serde_json::from_str(text).map_err(|err| ValidationFailure::of("payload", err.to_string()))
}
