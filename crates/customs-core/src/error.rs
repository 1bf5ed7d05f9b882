//! # Error Types
//!
//! Domain-specific error types for customs-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  customs-core errors (this file)                                       │
//! │  ├── CoreError        - Engine failures (currency, schedule, cascade)  │
//! │  └── ValidationError  - Request field failures                         │
//! │                                                                         │
//! │  customs-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  customs-service errors                                                │
//! │  └── ServiceError / ApiError - What the caller sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Every variant names the input field or the schedule rule at fault
//! 3. Errors are enum variants, never String
//! 4. Nothing is silently defaulted (an unknown currency is never "rate 1.0")

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Customs engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Currency code is well-formed but absent from the rate table.
    ///
    /// ## When This Occurs
    /// - Product or freight currency has no published rate in the snapshot
    /// - Rate table was built without the configured local/reference currency
    ///
    /// `field` names the request field when the code came from a request.
    #[error("Unsupported currency: {code}{}", field_suffix(.field))]
    UnsupportedCurrency { code: String, field: Option<String> },

    /// No usable rate table: never loaded, or older than the allowed age.
    #[error("Exchange rate table unavailable: {reason}")]
    StaleOrMissingRateTable { reason: String },

    /// Classification code failed the structural check.
    ///
    /// A well-formed code that simply matches no rule is NOT an error.
    #[error("Unknown classification code '{code}': {reason}")]
    UnknownClassification { code: String, reason: String },

    /// A charge rule's base refers to a charge that is not yet computed.
    ///
    /// ## When This Occurs
    /// ```text
    /// Rule order:  [GCT: base = CIF + ID-01]  [ID-01: base = CIF]
    ///                     │
    ///                     ▼
    /// ID-01 not in accumulator yet → CircularOrForwardBaseReference
    /// ```
    /// Also raised for self-references and duplicate charge names,
    /// which would make the accumulator ambiguous.
    #[error("Charge rule '{rule}' has an invalid base reference to '{reference}': {reason}")]
    CircularOrForwardBaseReference {
        rule: String,
        reference: String,
        reason: String,
    },

    /// Rate table, charge schedule or insurance policy is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An intermediate amount left the representable decimal range.
    ///
    /// Request amounts are capped at validation, so this means a rate,
    /// fee or percentage in the loaded data is out of proportion.
    #[error("Amount overflow while computing {stage}")]
    AmountOverflow { stage: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an UnsupportedCurrency error.
    pub fn unsupported_currency(code: impl Into<String>) -> Self {
        CoreError::UnsupportedCurrency {
            code: code.into(),
            field: None,
        }
    }

    /// Attaches the request field to an UnsupportedCurrency error.
    ///
    /// Other variants pass through unchanged.
    pub fn in_field(self, name: &str) -> Self {
        match self {
            CoreError::UnsupportedCurrency { code, field: None } => CoreError::UnsupportedCurrency {
                code,
                field: Some(name.to_string()),
            },
            other => other,
        }
    }

    /// Creates an AmountOverflow error.
    pub fn overflow(stage: impl Into<String>) -> Self {
        CoreError::AmountOverflow {
            stage: stage.into(),
        }
    }

    /// Creates a StaleOrMissingRateTable error.
    pub fn rate_table_unavailable(reason: impl Into<String>) -> Self {
        CoreError::StaleOrMissingRateTable {
            reason: reason.into(),
        }
    }

    /// Creates a CircularOrForwardBaseReference error.
    pub fn base_reference(
        rule: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::CircularOrForwardBaseReference {
            rule: rule.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Returns the offending request field, if the error is field-specific.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::Validation(err) => Some(err.field()),
            CoreError::UnknownClassification { .. } => Some("classification_code"),
            CoreError::UnsupportedCurrency { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" (in {f})"))
        .unwrap_or_default()
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when the request does not meet requirements.
/// Reported to the caller with the offending field, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Invalid format (e.g., non-numeric amount, malformed currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Returns the name of the field that failed validation.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }

    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a NotAllowed error from a static list of accepted values.
    pub fn not_allowed(field: impl Into<String>, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
