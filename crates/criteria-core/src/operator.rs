//! Comparison and logical operators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied by a single filter.
///
/// Serialized with the symbol the operator is written as (`=`, `NOT IN`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEquals,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEquals,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
    #[serde(rename = "CONTAINS")]
    Contains,
    #[serde(rename = "STARTS_WITH")]
    StartsWith,
    #[serde(rename = "ENDS_WITH")]
    EndsWith,
    #[serde(rename = "NOT_CONTAINS")]
    NotContains,
}

impl FilterOperator {
    /// Every operator, in declaration order
    pub const ALL: [Self; 16] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::GreaterThanOrEquals,
        Self::LessThan,
        Self::LessThanOrEquals,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::IsNull,
        Self::IsNotNull,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::NotContains,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEquals => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEquals => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::NotContains => "NOT_CONTAINS",
        }
    }

    /// Operators that test presence and ignore the filter value
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Operators whose value is a list
    pub const fn is_set(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict bound used by keyset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

impl From<CursorOperator> for FilterOperator {
    fn from(op: CursorOperator) -> Self {
        match op {
            CursorOperator::GreaterThan => Self::GreaterThan,
            CursorOperator::LessThan => Self::LessThan,
        }
    }
}

/// How the items of a filter group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
