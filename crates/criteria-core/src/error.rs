//! Error types for criteria construction and translation

use thiserror::Error;

use crate::criteria::CriteriaKind;
use crate::schema::JoinRelationType;

/// Criteria error type
///
/// Every variant is raised synchronously by the call that introduced the
/// problem. Nothing in this crate catches or retries them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriteriaError {
    /// A field is not declared in the schema
    #[error("The field '{field}' is not defined in the schema '{source_name}'.")]
    SchemaViolation { field: String, source_name: String },

    /// An alias is not declared in the schema
    #[error("The alias '{alias}' is not defined in the schema '{source_name}'.")]
    UnknownAlias { alias: String, source_name: String },

    /// The parent schema does not declare the alias as joinable
    #[error("The alias '{alias}' is not configured for join in the schema '{source_name}'.")]
    JoinNotConfigured { alias: String, source_name: String },

    /// Cursor bounds are malformed
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Negative take
    #[error("Take value can't be negative (got {0})")]
    NegativeTake(i64),

    /// Negative skip
    #[error("Skip value can't be negative (got {0})")]
    NegativeSkip(i64),

    /// Join parameters don't match the declared relation type
    #[error(
        "Join '{alias}' is declared as {relation} but received {shape} join parameters"
    )]
    JoinShapeMismatch {
        alias: String,
        relation: JoinRelationType,
        shape: &'static str,
    },

    /// A root criteria was passed where a join criteria is expected
    #[error("Criteria '{alias}' is a {kind} criteria and cannot be joined")]
    NotAJoin { alias: String, kind: CriteriaKind },

    /// A join criteria was visited without its parent join entry
    #[error("Join criteria '{alias}' can only be translated through the criteria it is joined to")]
    DetachedJoin { alias: String },

    /// A float filter value is NaN or infinite
    #[error("Filter value for field '{field}' must be a finite number")]
    NonFiniteValue { field: String },

    /// Schema descriptor is malformed
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A translator met a construct it cannot express
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl CriteriaError {
    /// Whether the error comes from a field or alias missing in a schema
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation { .. } | Self::UnknownAlias { .. } | Self::JoinNotConfigured { .. }
        )
    }

    /// Whether the error comes from a broken structural invariant
    /// (cursor shape, negative bounds, join shape, criteria kind)
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidCursor(_)
                | Self::NegativeTake(_)
                | Self::NegativeSkip(_)
                | Self::JoinShapeMismatch { .. }
                | Self::NotAJoin { .. }
                | Self::DetachedJoin { .. }
                | Self::NonFiniteValue { .. }
                | Self::InvalidSchema(_)
        )
    }
}

/// Result type for criteria operations
pub type CriteriaResult<T> = Result<T, CriteriaError>;
