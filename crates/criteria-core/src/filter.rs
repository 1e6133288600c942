//! Single field comparisons.

use serde::{Deserialize, Serialize};

use crate::operator::FilterOperator;
use crate::value::FilterValue;
use crate::visitor::CriteriaVisitor;

/// Plain, serializable `{field, operator, value}` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPrimitive {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl FilterPrimitive {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Primitive with no value, for `IS NULL` / `IS NOT NULL`
    pub fn without_value(field: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
        }
    }
}

/// Immutable comparison of one field against a value.
///
/// No schema check happens here; [`Criteria`](crate::Criteria) validates the
/// field before a filter reaches its group.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    primitive: FilterPrimitive,
}

impl Filter {
    pub fn new(primitive: FilterPrimitive) -> Self {
        Self { primitive }
    }

    pub fn field(&self) -> &str {
        &self.primitive.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.primitive.operator
    }

    pub fn value(&self) -> Option<&FilterValue> {
        self.primitive.value.as_ref()
    }

    pub fn to_primitive(&self) -> FilterPrimitive {
        self.primitive.clone()
    }

    pub fn accept<V>(&self, visitor: &mut V, alias: &str) -> Result<V::FilterOutput, V::Error>
    where
        V: CriteriaVisitor + ?Sized,
    {
        visitor.visit_filter(self, alias)
    }
}

impl From<FilterPrimitive> for Filter {
    fn from(primitive: FilterPrimitive) -> Self {
        Self::new(primitive)
    }
}
