//! Error types for translation

use criteria_core::CriteriaError;
use thiserror::Error;

/// Translation error type
#[derive(Error, Debug)]
pub enum TranslateError {
    /// Structural or schema error surfaced while walking the criteria
    #[error(transparent)]
    Criteria(#[from] CriteriaError),

    /// Construct the target cannot express
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid translator configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed TOML configuration
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for translation
pub type TranslateResult<T> = Result<T, TranslateError>;
