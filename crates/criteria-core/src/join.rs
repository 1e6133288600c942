//! Join parameters, their resolution against schemas, and the per-criteria
//! join registry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::criteria::{Criteria, CriteriaKind};
use crate::error::{CriteriaError, CriteriaResult};
use crate::schema::JoinRelationType;
use crate::visitor::CriteriaVisitor;

/// Suffix of the generated pivot alias, `{parent}_{join}_pivot`
pub const DEFAULT_PIVOT_SUFFIX: &str = "pivot";

/// Column pair for one-to-one, one-to-many and many-to-one joins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleJoin {
    pub parent_field: String,
    pub join_field: String,
}

/// Pivot column and the entity field it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotField {
    pub pivot_field: String,
    pub reference: String,
}

/// Many-to-many join through an intermediate source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotJoin {
    pub pivot_source_name: String,
    pub parent_field: PivotField,
    pub join_field: PivotField,
}

/// Join parameters as supplied by the caller.
///
/// The shape must agree with the relation type the parent schema declares:
/// `Pivot` for `many_to_many`, `Simple` for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinParameters {
    Pivot(PivotJoin),
    Simple(SimpleJoin),
}

impl JoinParameters {
    pub fn simple(parent_field: impl Into<String>, join_field: impl Into<String>) -> Self {
        Self::Simple(SimpleJoin {
            parent_field: parent_field.into(),
            join_field: join_field.into(),
        })
    }

    pub fn pivot(
        pivot_source_name: impl Into<String>,
        parent_field: PivotField,
        join_field: PivotField,
    ) -> Self {
        Self::Pivot(PivotJoin {
            pivot_source_name: pivot_source_name.into(),
            parent_field,
            join_field,
        })
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::Pivot(_) => "pivot",
            Self::Simple(_) => "simple",
        }
    }
}

impl PivotField {
    pub fn new(pivot_field: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            pivot_field: pivot_field.into(),
            reference: reference.into(),
        }
    }
}

/// Join parameters after validation, with the parent's identity attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJoin {
    pub relation_type: JoinRelationType,
    pub parent_alias: String,
    pub parent_source_name: String,
    pub parameters: JoinParameters,
}

impl ResolvedJoin {
    /// Validate `parameters` for joining `child` onto `parent`.
    pub fn resolve(
        parent: &Criteria,
        child: &Criteria,
        parameters: JoinParameters,
    ) -> CriteriaResult<Self> {
        if !child.kind().is_join() {
            return Err(CriteriaError::NotAJoin {
                alias: child.alias().to_string(),
                kind: child.kind(),
            });
        }

        let relation_type = parent.schema().join_relation(child.alias()).ok_or_else(|| {
            CriteriaError::JoinNotConfigured {
                alias: child.alias().to_string(),
                source_name: parent.source_name().to_string(),
            }
        })?;

        if relation_type.is_pivot() != matches!(parameters, JoinParameters::Pivot(_)) {
            return Err(CriteriaError::JoinShapeMismatch {
                alias: child.alias().to_string(),
                relation: relation_type,
                shape: parameters.shape(),
            });
        }

        match &parameters {
            JoinParameters::Simple(simple) => {
                parent.schema().assert_field(&simple.parent_field)?;
                child.schema().assert_field(&simple.join_field)?;
            }
            JoinParameters::Pivot(pivot) => {
                parent.schema().assert_field(&pivot.parent_field.reference)?;
                child.schema().assert_field(&pivot.join_field.reference)?;
            }
        }

        Ok(Self {
            relation_type,
            parent_alias: parent.alias().to_string(),
            parent_source_name: parent.source_name().to_string(),
            parameters,
        })
    }

    /// Alias of the pivot source when joining `join_alias` through it
    pub fn pivot_alias(&self, join_alias: &str, suffix: &str) -> String {
        format!("{}_{}_{}", self.parent_alias, join_alias, suffix)
    }
}

/// A joined criteria together with its resolved parameters
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEntry {
    criteria: Criteria,
    parameters: ResolvedJoin,
}

impl JoinEntry {
    pub(crate) fn new(criteria: Criteria, parameters: ResolvedJoin) -> Self {
        Self {
            criteria,
            parameters,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn parameters(&self) -> &ResolvedJoin {
        &self.parameters
    }

    pub fn alias(&self) -> &str {
        self.criteria.alias()
    }

    /// Dispatch to the visitor method matching the joined criteria's kind
    pub fn accept<V>(&self, visitor: &mut V, context: V::Context) -> Result<V::Output, V::Error>
    where
        V: CriteriaVisitor + ?Sized,
    {
        match self.criteria.kind() {
            CriteriaKind::InnerJoin => visitor.visit_inner_join(&self.criteria, &self.parameters, context),
            CriteriaKind::LeftJoin => visitor.visit_left_join(&self.criteria, &self.parameters, context),
            CriteriaKind::OuterJoin => visitor.visit_outer_join(&self.criteria, &self.parameters, context),
            CriteriaKind::Root => Err(CriteriaError::NotAJoin {
                alias: self.criteria.alias().to_string(),
                kind: CriteriaKind::Root,
            }
            .into()),
        }
    }
}

/// Joins of one criteria, keyed by the joined alias.
///
/// Registration order is kept. Registering an alias twice replaces the
/// earlier entry in its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinRegistry {
    entries: Vec<JoinEntry>,
}

impl JoinRegistry {
    /// Insert or replace. Returns true when an entry was replaced.
    pub(crate) fn insert(&mut self, entry: JoinEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.alias() == entry.alias()) {
            Some(existing) => {
                debug!(alias = %entry.alias(), "replacing join");
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn get(&self, alias: &str) -> Option<&JoinEntry> {
        self.entries.iter().find(|e| e.alias() == alias)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JoinEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.iter().map(JoinEntry::alias).collect()
    }
}

impl<'a> IntoIterator for &'a JoinRegistry {
    type Item = &'a JoinEntry;
    type IntoIter = std::slice::Iter<'a, JoinEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_parameters_pick_shape() {
        let simple: JoinParameters =
            serde_json::from_value(json!({"parent_field": "user_uuid", "join_field": "uuid"}))
                .unwrap();
        assert_eq!(simple, JoinParameters::simple("user_uuid", "uuid"));

        let pivot: JoinParameters = serde_json::from_value(json!({
            "pivot_source_name": "user_permission_pivot_table",
            "parent_field": {"pivot_field": "user_foreign_key", "reference": "uuid"},
            "join_field": {"pivot_field": "permission_foreign_key", "reference": "uuid"}
        }))
        .unwrap();
        assert_eq!(pivot.shape(), "pivot");
    }

    #[test]
    fn test_pivot_alias_convention() {
        let resolved = ResolvedJoin {
            relation_type: JoinRelationType::ManyToMany,
            parent_alias: "users".to_string(),
            parent_source_name: "user".to_string(),
            parameters: JoinParameters::pivot(
                "user_permission_pivot_table",
                PivotField::new("user_foreign_key", "uuid"),
                PivotField::new("permission_foreign_key", "uuid"),
            ),
        };

        assert_eq!(
            resolved.pivot_alias("permissions", DEFAULT_PIVOT_SUFFIX),
            "users_permissions_pivot"
        );
    }
}
