//! # Criteria SQL
//!
//! Translators from [`criteria_core::Criteria`] to SQL targets.
//!
//! ## Translators
//!
//! - [`MysqlTranslator`]: a single MySQL `SELECT` with positional parameters
//! - [`BuilderTranslator`]: a [`QueryPlan`] of ORM query-builder calls with
//!   named parameters
//!
//! ## Example
//!
//! ```
//! use criteria_core::{Criteria, CriteriaSchema, CriteriaTranslator, FilterOperator, FilterPrimitive};
//! use criteria_sql::MysqlTranslator;
//!
//! let schema = CriteriaSchema::builder("user")
//!     .alias("users")
//!     .fields(["uuid", "email"])
//!     .build()?;
//!
//! let mut criteria = Criteria::create(schema, "users")?;
//! criteria
//!     .set_select(["uuid"])?
//!     .where_(FilterPrimitive::new("email", FilterOperator::Equals, "a@b.c"))?;
//!
//! let mut translator = MysqlTranslator::new();
//! let sql = translator.translate(&criteria, ())?;
//!
//! assert_eq!(sql, "SELECT `users`.`uuid` FROM `user` AS `users` WHERE (`users`.`email` = ?);");
//! assert_eq!(translator.take_params(), [serde_json::json!("a@b.c")]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all)]

mod builder;
mod config;
mod error;
mod mysql;

pub use builder::{BuilderCall, BuilderTranslator, JoinKind, QueryPlan};
pub use config::{SkipWithoutTake, SqlTranslatorConfig};
pub use error::{TranslateError, TranslateResult};
pub use mysql::MysqlTranslator;
