//! Entity schema descriptors.
//!
//! A schema declares the source a criteria reads from, the aliases it may be
//! referenced by, its fields and the aliases it may be joined to. Criteria
//! check every field and alias reference against it at call time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{CriteriaError, CriteriaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl JoinRelationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    /// Relations resolved through an intermediate pivot source
    pub const fn is_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

impl fmt::Display for JoinRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joinable alias declared by a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaJoin {
    pub alias: String,
    pub join_relation_type: JoinRelationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaSchema {
    source_name: String,
    alias: Vec<String>,
    fields: Vec<String>,
    #[serde(default)]
    joins: Vec<SchemaJoin>,
}

impl CriteriaSchema {
    pub fn builder(source_name: impl Into<String>) -> CriteriaSchemaBuilder {
        CriteriaSchemaBuilder {
            schema: Self {
                source_name: source_name.into(),
                alias: Vec::new(),
                fields: Vec::new(),
                joins: Vec::new(),
            },
        }
    }

    /// Parse and validate a JSON schema descriptor
    pub fn from_json_str(json: &str) -> CriteriaResult<Arc<Self>> {
        let schema: Self = serde_json::from_str(json)
            .map_err(|e| CriteriaError::InvalidSchema(e.to_string()))?;
        schema.validate()?;
        Ok(Arc::new(schema))
    }

    fn validate(&self) -> CriteriaResult<()> {
        if self.source_name.is_empty() {
            return Err(CriteriaError::InvalidSchema(
                "source_name must not be empty".to_string(),
            ));
        }
        if self.alias.is_empty() {
            return Err(CriteriaError::InvalidSchema(format!(
                "schema '{}' declares no alias",
                self.source_name
            )));
        }
        if self.fields.is_empty() {
            return Err(CriteriaError::InvalidSchema(format!(
                "schema '{}' declares no fields",
                self.source_name
            )));
        }

        let mut seen = HashSet::new();
        if let Some(field) = self.fields.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(CriteriaError::InvalidSchema(format!(
                "field '{}' is declared twice in schema '{}'",
                field, self.source_name
            )));
        }

        let mut seen = HashSet::new();
        if let Some(join) = self.joins.iter().find(|j| !seen.insert(j.alias.as_str())) {
            return Err(CriteriaError::InvalidSchema(format!(
                "join alias '{}' is declared twice in schema '{}'",
                join.alias, self.source_name
            )));
        }

        Ok(())
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn aliases(&self) -> &[String] {
        &self.alias
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn joins(&self) -> &[SchemaJoin] {
        &self.joins
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias.iter().any(|a| a == alias)
    }

    /// Fail with a schema violation naming the field and this source
    pub fn assert_field(&self, field: &str) -> CriteriaResult<()> {
        if self.has_field(field) {
            Ok(())
        } else {
            Err(CriteriaError::SchemaViolation {
                field: field.to_string(),
                source_name: self.source_name.clone(),
            })
        }
    }

    pub fn assert_alias(&self, alias: &str) -> CriteriaResult<()> {
        if self.has_alias(alias) {
            Ok(())
        } else {
            Err(CriteriaError::UnknownAlias {
                alias: alias.to_string(),
                source_name: self.source_name.clone(),
            })
        }
    }

    /// Declared relation type for a joinable alias
    pub fn join_relation(&self, alias: &str) -> Option<JoinRelationType> {
        self.joins
            .iter()
            .find(|j| j.alias == alias)
            .map(|j| j.join_relation_type)
    }
}

pub struct CriteriaSchemaBuilder {
    schema: CriteriaSchema,
}

impl CriteriaSchemaBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.schema.alias.push(alias.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn join(mut self, alias: impl Into<String>, relation: JoinRelationType) -> Self {
        self.schema.joins.push(SchemaJoin {
            alias: alias.into(),
            join_relation_type: relation,
        });
        self
    }

    pub fn build(self) -> CriteriaResult<Arc<CriteriaSchema>> {
        self.schema.validate()?;
        Ok(Arc::new(self.schema))
    }
}
