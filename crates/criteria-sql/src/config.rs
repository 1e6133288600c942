//! Translator configuration
//!
//! Shared by [`MysqlTranslator`](crate::MysqlTranslator) and
//! [`BuilderTranslator`](crate::BuilderTranslator). Loadable from TOML:
//!
//! ```toml
//! pivot_alias_suffix = "pivot"
//! skip_without_take = "omit"
//! wrap_contains = false
//! ```

use criteria_core::DEFAULT_PIVOT_SUFFIX;
use serde::{Deserialize, Serialize};

use crate::error::{TranslateError, TranslateResult};

/// What to do with `skip > 0` when `take == 0` (unbounded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipWithoutTake {
    /// Drop the offset and log it
    #[default]
    Omit,
    /// Fail the translation
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlTranslatorConfig {
    /// Pivot aliases are `{parent}_{join}_{suffix}`
    pub pivot_alias_suffix: String,
    pub skip_without_take: SkipWithoutTake,
    /// Bind `CONTAINS` / `NOT_CONTAINS` values as `%value%`
    pub wrap_contains: bool,
}

impl Default for SqlTranslatorConfig {
    fn default() -> Self {
        Self {
            pivot_alias_suffix: DEFAULT_PIVOT_SUFFIX.to_string(),
            skip_without_take: SkipWithoutTake::Omit,
            wrap_contains: false,
        }
    }
}

impl SqlTranslatorConfig {
    pub fn from_toml_str(input: &str) -> TranslateResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TranslateResult<()> {
        let suffix = &self.pivot_alias_suffix;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TranslateError::Config(format!(
                "pivot_alias_suffix must be a non-empty identifier, got '{}'",
                suffix
            )));
        }
        Ok(())
    }
}
