//! Keyset pagination bounds.
//!
//! A cursor over `(f1, f2)` with operator `op` selects rows satisfying
//! `(f1 op v1) OR (f1 = v1 AND f2 op v2)`. Every translator expands it that
//! way; it is not folded into the filter group.

use serde::{Deserialize, Serialize};

use crate::error::{CriteriaError, CriteriaResult};
use crate::filter::{Filter, FilterPrimitive};
use crate::operator::CursorOperator;
use crate::order::OrderDirection;
use crate::value::FilterValue;

/// Field/value pair the cursor resumes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorBound {
    pub field: String,
    #[serde(default)]
    pub value: Option<FilterValue>,
}

impl CursorBound {
    pub fn new(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    filters: [Filter; 2],
    operator: CursorOperator,
    direction: OrderDirection,
}

impl Cursor {
    /// Validate the bounds and build the cursor.
    ///
    /// Fails when a field name is empty, a value is absent, null, non-finite
    /// or a list, or both bounds name the same field.
    pub fn new(
        bounds: [CursorBound; 2],
        operator: CursorOperator,
        direction: OrderDirection,
    ) -> CriteriaResult<Self> {
        let [first, second] = bounds;

        if first.field == second.field {
            return Err(CriteriaError::InvalidCursor(
                "Cursor fields must be different".to_string(),
            ));
        }

        let first = Self::bound_filter(first, operator)?;
        let second = Self::bound_filter(second, operator)?;

        Ok(Self {
            filters: [first, second],
            operator,
            direction,
        })
    }

    fn bound_filter(bound: CursorBound, operator: CursorOperator) -> CriteriaResult<Filter> {
        if bound.field.is_empty() {
            return Err(CriteriaError::InvalidCursor(
                "Cursor field must be defined".to_string(),
            ));
        }

        let value = match bound.value {
            Some(FilterValue::Scalar(scalar)) if !scalar.is_finite() => {
                return Err(CriteriaError::InvalidCursor(format!(
                    "Cursor value for field {} must be a finite number",
                    bound.field
                )))
            }
            Some(FilterValue::Scalar(scalar)) if !scalar.is_null() => FilterValue::Scalar(scalar),
            Some(FilterValue::List(_)) => {
                return Err(CriteriaError::InvalidCursor(format!(
                    "Cursor value for field {} must be a single value",
                    bound.field
                )))
            }
            _ => {
                return Err(CriteriaError::InvalidCursor(format!(
                    "Cursor value for field {} must be defined",
                    bound.field
                )))
            }
        };

        Ok(Filter::new(FilterPrimitive::new(
            bound.field,
            operator.into(),
            value,
        )))
    }

    /// The two bound filters, in `[f1, f2]` order
    pub fn filters(&self) -> &[Filter; 2] {
        &self.filters
    }

    pub fn operator(&self) -> CursorOperator {
        self.operator
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }
}
