//! # Criteria Core
//!
//! Composable, schema-checked query specifications and the visitor contract
//! that turns them into concrete queries.
//!
//! A [`Criteria`] describes filters, joins, ordering, pagination, field
//! selection and keyset cursors against a declared [`CriteriaSchema`]. It
//! knows nothing about the technology that will run the query: a
//! [`CriteriaVisitor`] walks the tree and produces whatever the target needs
//! (a SQL string, a query-builder plan, an in-memory matcher).
//!
//! ## Modules
//!
//! - `filter` / `group`: single comparisons and normalized AND/OR trees
//! - `order` / `cursor`: sort keys and keyset pagination bounds
//! - `schema`: entity descriptors every reference is checked against
//! - `criteria` / `join`: the builder and its join registry
//! - `visitor`: the double-dispatch translation contract
//! - `memory`: an evaluating translator over JSON rows

#![warn(clippy::all)]

mod criteria;
mod cursor;
mod error;
mod filter;
mod group;
mod join;
pub mod memory;
mod operator;
mod order;
mod schema;
mod value;
mod visitor;

// Include fixtures for tests, and for downstream suites via `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use criteria::{Criteria, CriteriaKind};
pub use cursor::{Cursor, CursorBound};
pub use error::{CriteriaError, CriteriaResult};
pub use filter::{Filter, FilterPrimitive};
pub use group::{normalize, FilterGroup, FilterGroupPrimitive, FilterItem, FilterItemPrimitive};
pub use join::{
    JoinEntry, JoinParameters, JoinRegistry, PivotField, PivotJoin, ResolvedJoin, SimpleJoin,
    DEFAULT_PIVOT_SUFFIX,
};
pub use memory::{MemoryTranslator, RowMatcher};
pub use operator::{CursorOperator, FilterOperator, LogicalOperator};
pub use order::{Order, OrderDirection};
pub use schema::{CriteriaSchema, CriteriaSchemaBuilder, JoinRelationType, SchemaJoin};
pub use value::{FilterValue, Scalar};
pub use visitor::{CriteriaTranslator, CriteriaVisitor};
