//! Composable query criteria.
//!
//! A [`Criteria`] is built once against a schema and alias, mutated through
//! a chain of validated calls, then handed to a translator:
//!
//! ```
//! # use criteria_core::{Criteria, CriteriaSchema, FilterOperator, FilterPrimitive, OrderDirection};
//! # fn main() -> Result<(), criteria_core::CriteriaError> {
//! let schema = CriteriaSchema::builder("post")
//!     .alias("posts")
//!     .fields(["uuid", "title", "created_at"])
//!     .build()?;
//!
//! let mut criteria = Criteria::create(schema, "posts")?;
//! criteria
//!     .where_(FilterPrimitive::new("title", FilterOperator::Like, "%rust%"))?
//!     .order_by("created_at", OrderDirection::Desc)?
//!     .set_take(10)?;
//! # Ok(())
//! # }
//! ```
//!
//! Every mutator validates before it touches state, so a failed call leaves
//! the criteria exactly as it was.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cursor::{Cursor, CursorBound};
use crate::error::{CriteriaError, CriteriaResult};
use crate::filter::FilterPrimitive;
use crate::group::FilterGroup;
use crate::join::{JoinEntry, JoinParameters, JoinRegistry, ResolvedJoin};
use crate::operator::CursorOperator;
use crate::order::{Order, OrderDirection};
use crate::schema::CriteriaSchema;
use crate::visitor::CriteriaVisitor;

/// Which visitor method a criteria is translated through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriteriaKind {
    Root,
    InnerJoin,
    LeftJoin,
    OuterJoin,
}

impl CriteriaKind {
    pub const fn is_join(self) -> bool {
        !matches!(self, Self::Root)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::InnerJoin => "inner join",
            Self::LeftJoin => "left join",
            Self::OuterJoin => "full outer join",
        }
    }
}

impl fmt::Display for CriteriaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    kind: CriteriaKind,
    schema: Arc<CriteriaSchema>,
    alias: String,
    select: Vec<String>,
    select_all: bool,
    filter_group: FilterGroup,
    orders: Vec<Order>,
    take: usize,
    skip: usize,
    cursor: Option<Cursor>,
    joins: JoinRegistry,
}

impl Criteria {
    fn with_kind(
        kind: CriteriaKind,
        schema: Arc<CriteriaSchema>,
        alias: impl Into<String>,
    ) -> CriteriaResult<Self> {
        let alias = alias.into();
        schema.assert_alias(&alias)?;

        debug!(
            kind = %kind,
            source = %schema.source_name(),
            alias = %alias,
            "criteria created"
        );

        Ok(Self {
            kind,
            schema,
            alias,
            select: Vec::new(),
            select_all: true,
            filter_group: FilterGroup::default(),
            orders: Vec::new(),
            take: 0,
            skip: 0,
            cursor: None,
            joins: JoinRegistry::default(),
        })
    }

    /// Root criteria, translated through `visit_root`
    pub fn create(schema: Arc<CriteriaSchema>, alias: impl Into<String>) -> CriteriaResult<Self> {
        Self::with_kind(CriteriaKind::Root, schema, alias)
    }

    pub fn create_inner_join(
        schema: Arc<CriteriaSchema>,
        alias: impl Into<String>,
    ) -> CriteriaResult<Self> {
        Self::with_kind(CriteriaKind::InnerJoin, schema, alias)
    }

    pub fn create_left_join(
        schema: Arc<CriteriaSchema>,
        alias: impl Into<String>,
    ) -> CriteriaResult<Self> {
        Self::with_kind(CriteriaKind::LeftJoin, schema, alias)
    }

    pub fn create_full_outer_join(
        schema: Arc<CriteriaSchema>,
        alias: impl Into<String>,
    ) -> CriteriaResult<Self> {
        Self::with_kind(CriteriaKind::OuterJoin, schema, alias)
    }

    pub fn kind(&self) -> CriteriaKind {
        self.kind
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn source_name(&self) -> &str {
        self.schema.source_name()
    }

    pub fn schema(&self) -> &Arc<CriteriaSchema> {
        &self.schema
    }

    /// Selected fields; select-all resolves to every schema field
    pub fn select(&self) -> &[String] {
        if self.select_all {
            self.schema.fields()
        } else {
            &self.select
        }
    }

    pub fn is_select_all(&self) -> bool {
        self.select_all
    }

    pub fn root_filter_group(&self) -> &FilterGroup {
        &self.filter_group
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Row limit; 0 means unbounded
    pub fn take(&self) -> usize {
        self.take
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn joins(&self) -> &JoinRegistry {
        &self.joins
    }

    fn check_filter(&self, filter: &FilterPrimitive) -> CriteriaResult<()> {
        self.schema.assert_field(&filter.field)?;
        if filter.value.as_ref().is_some_and(|value| !value.is_finite()) {
            return Err(CriteriaError::NonFiniteValue {
                field: filter.field.clone(),
            });
        }
        Ok(())
    }

    /// Replace the filter tree with `AND[filter]`
    pub fn where_(&mut self, filter: FilterPrimitive) -> CriteriaResult<&mut Self> {
        self.check_filter(&filter)?;
        trace!(alias = %self.alias, field = %filter.field, "where");
        self.filter_group = FilterGroup::create_initial(filter);
        Ok(self)
    }

    /// AND `filter` onto the most recent branch
    pub fn and_where(&mut self, filter: FilterPrimitive) -> CriteriaResult<&mut Self> {
        self.check_filter(&filter)?;
        trace!(alias = %self.alias, field = %filter.field, "and_where");
        self.filter_group = self.filter_group.add_and(filter);
        Ok(self)
    }

    /// Open a new OR branch with `filter`
    pub fn or_where(&mut self, filter: FilterPrimitive) -> CriteriaResult<&mut Self> {
        self.check_filter(&filter)?;
        trace!(alias = %self.alias, field = %filter.field, "or_where");
        self.filter_group = self.filter_group.add_or(filter);
        Ok(self)
    }

    /// Restrict the selection. Duplicates are dropped, first occurrence wins.
    pub fn set_select<I, S>(&mut self, fields: I) -> CriteriaResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut select: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            self.schema.assert_field(&field)?;
            if !select.contains(&field) {
                select.push(field);
            }
        }

        self.select = select;
        self.select_all = false;
        Ok(self)
    }

    pub fn select_all(&mut self) -> &mut Self {
        self.select.clear();
        self.select_all = true;
        self
    }

    /// Append a sort key; earlier keys take precedence
    pub fn order_by(
        &mut self,
        field: impl Into<String>,
        direction: OrderDirection,
    ) -> CriteriaResult<&mut Self> {
        let field = field.into();
        self.schema.assert_field(&field)?;
        self.orders.push(Order::new(field, direction));
        Ok(self)
    }

    /// Row limit. 0 means unbounded.
    pub fn set_take(&mut self, take: i64) -> CriteriaResult<&mut Self> {
        self.take = usize::try_from(take).map_err(|_| CriteriaError::NegativeTake(take))?;
        Ok(self)
    }

    pub fn set_skip(&mut self, skip: i64) -> CriteriaResult<&mut Self> {
        self.skip = usize::try_from(skip).map_err(|_| CriteriaError::NegativeSkip(skip))?;
        Ok(self)
    }

    pub fn set_cursor(
        &mut self,
        bounds: [CursorBound; 2],
        operator: CursorOperator,
        direction: OrderDirection,
    ) -> CriteriaResult<&mut Self> {
        for bound in bounds.iter().filter(|b| !b.field.is_empty()) {
            self.schema.assert_field(&bound.field)?;
        }

        self.cursor = Some(Cursor::new(bounds, operator, direction)?);
        Ok(self)
    }

    /// Register `criteria` as a join of this criteria.
    ///
    /// The joined alias must be declared joinable by this schema and the
    /// parameter shape must match the declared relation. Joining an alias
    /// that is already registered replaces that entry.
    pub fn join(
        &mut self,
        criteria: Criteria,
        parameters: JoinParameters,
    ) -> CriteriaResult<&mut Self> {
        let resolved = ResolvedJoin::resolve(self, &criteria, parameters)?;

        debug!(
            parent = %self.alias,
            alias = %criteria.alias,
            relation = %resolved.relation_type,
            kind = %criteria.kind,
            "join registered"
        );

        self.joins.insert(JoinEntry::new(criteria, resolved));
        Ok(self)
    }

    /// Translate a root criteria through `visit_root`.
    ///
    /// Join criteria carry no resolved parameters of their own and are
    /// visited through [`JoinEntry::accept`].
    pub fn accept<V>(&self, visitor: &mut V, context: V::Context) -> Result<V::Output, V::Error>
    where
        V: CriteriaVisitor + ?Sized,
    {
        match self.kind {
            CriteriaKind::Root => visitor.visit_root(self, context),
            _ => Err(CriteriaError::DetachedJoin {
                alias: self.alias.clone(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::PivotField;
    use crate::operator::{FilterOperator, LogicalOperator};
    use crate::test_support::{permission_schema, post_schema, user_schema};
    use crate::value::Scalar;
    use test_case::test_case;
    use tracing_test::traced_test;

    fn eq(field: &str, value: &str) -> FilterPrimitive {
        FilterPrimitive::new(field, FilterOperator::Equals, value)
    }

    fn posts() -> Criteria {
        Criteria::create(post_schema(), "posts").unwrap()
    }

    fn publisher() -> Criteria {
        Criteria::create_inner_join(user_schema(), "publisher").unwrap()
    }

    #[test]
    fn test_defaults() {
        let criteria = posts();

        assert_eq!(criteria.kind(), CriteriaKind::Root);
        assert_eq!(criteria.source_name(), "post");
        assert!(criteria.is_select_all());
        assert_eq!(criteria.select(), post_schema().fields());
        assert!(criteria.root_filter_group().is_empty());
        assert_eq!(
            criteria.root_filter_group().logical_operator(),
            LogicalOperator::And
        );
        assert_eq!(criteria.take(), 0);
        assert_eq!(criteria.skip(), 0);
        assert!(criteria.cursor().is_none());
        assert!(criteria.joins().is_empty());
    }

    #[test]
    fn test_unknown_alias_is_rejected() {
        let err = Criteria::create(post_schema(), "articles").unwrap_err();
        assert!(err.is_schema_violation());
    }

    #[test]
    fn test_where_rejects_unknown_field() {
        let mut criteria = posts();
        let err = criteria
            .where_(eq("not_a_real_field", "x"))
            .map(|_| ())
            .unwrap_err();

        assert_eq!(
            err,
            CriteriaError::SchemaViolation {
                field: "not_a_real_field".to_string(),
                source_name: "post".to_string(),
            }
        );
    }

    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinity")]
    fn test_non_finite_values_are_rejected(value: f64) {
        let mut criteria = posts();
        criteria.where_(eq("title", "a")).unwrap();
        let before = criteria.root_filter_group().clone();

        let err = criteria
            .or_where(FilterPrimitive::new("created_at", FilterOperator::GreaterThan, value))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            err,
            CriteriaError::NonFiniteValue {
                field: "created_at".to_string()
            }
        );
        assert!(err.is_structural());
        assert_eq!(criteria.root_filter_group(), &before);

        let err = criteria
            .and_where(FilterPrimitive::new(
                "uuid",
                FilterOperator::In,
                vec![Scalar::Int(1), Scalar::Float(value)],
            ))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, CriteriaError::NonFiniteValue { .. }));
    }

    #[test]
    fn test_where_replaces_group() {
        let mut criteria = posts();
        criteria
            .where_(eq("title", "a"))
            .unwrap()
            .or_where(eq("body", "b"))
            .unwrap()
            .where_(eq("uuid", "c"))
            .unwrap();

        assert_eq!(
            criteria.root_filter_group(),
            &FilterGroup::create_initial(eq("uuid", "c"))
        );
    }

    #[test]
    fn test_chained_filters_compose_sum_of_products() {
        let mut criteria = posts();
        criteria
            .where_(eq("title", "a"))
            .unwrap()
            .and_where(eq("body", "b"))
            .unwrap()
            .or_where(eq("uuid", "c"))
            .unwrap();

        let expected = FilterGroup::create_initial(eq("title", "a"))
            .add_and(eq("body", "b"))
            .add_or(eq("uuid", "c"));
        assert_eq!(criteria.root_filter_group(), &expected);
        assert_eq!(expected.logical_operator(), LogicalOperator::Or);
    }

    #[test]
    fn test_and_where_without_where() {
        let mut criteria = posts();
        criteria.and_where(eq("title", "a")).unwrap();

        assert_eq!(
            criteria.root_filter_group(),
            &FilterGroup::create_initial(eq("title", "a"))
        );
    }

    #[test]
    fn test_failed_select_keeps_previous_state() {
        let mut criteria = posts();
        criteria.set_select(["uuid", "title"]).unwrap();

        assert!(criteria.set_select(["uuid", "nope"]).is_err());
        assert_eq!(criteria.select(), ["uuid", "title"]);
        assert!(!criteria.is_select_all());

        criteria.select_all();
        assert!(criteria.is_select_all());
        assert_eq!(criteria.select().len(), post_schema().fields().len());
    }

    #[test]
    fn test_select_drops_duplicates() {
        let mut criteria = posts();
        criteria.set_select(["title", "uuid", "title"]).unwrap();
        assert_eq!(criteria.select(), ["title", "uuid"]);
    }

    #[test]
    fn test_orders_accumulate() {
        let mut criteria = posts();
        criteria
            .order_by("created_at", OrderDirection::Desc)
            .unwrap()
            .order_by("uuid", OrderDirection::Asc)
            .unwrap();

        assert_eq!(
            criteria.orders(),
            [
                Order::new("created_at", OrderDirection::Desc),
                Order::new("uuid", OrderDirection::Asc)
            ]
        );
        assert!(criteria.order_by("nope", OrderDirection::Asc).is_err());
    }

    #[test_case(-1, 0 ; "negative take")]
    #[test_case(0, -5 ; "negative skip")]
    fn test_negative_bounds(take: i64, skip: i64) {
        let mut criteria = posts();
        let take_result = criteria.set_take(take).map(|_| ());
        let skip_result = criteria.set_skip(skip).map(|_| ());

        let err = take_result.and(skip_result).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(criteria.take(), 0);
        assert_eq!(criteria.skip(), 0);
    }

    #[test]
    fn test_cursor_fields_are_schema_checked() {
        let mut criteria = posts();
        let err = criteria
            .set_cursor(
                [
                    CursorBound::new("created_at", "2024-01-01"),
                    CursorBound::new("nope", "x"),
                ],
                CursorOperator::GreaterThan,
                OrderDirection::Asc,
            )
            .map(|_| ())
            .unwrap_err();
        assert!(err.is_schema_violation());

        criteria
            .set_cursor(
                [
                    CursorBound::new("created_at", "2024-01-01"),
                    CursorBound::new("uuid", "x"),
                ],
                CursorOperator::GreaterThan,
                OrderDirection::Asc,
            )
            .unwrap();
        assert!(criteria.cursor().is_some());
    }

    #[test]
    fn test_join_requires_declared_alias() {
        let mut criteria = posts();
        let stranger = Criteria::create_inner_join(permission_schema(), "permissions").unwrap();

        let err = criteria
            .join(stranger, JoinParameters::simple("uuid", "uuid"))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, CriteriaError::JoinNotConfigured { .. }));
    }

    #[test]
    fn test_join_shape_must_match_relation() {
        let mut criteria = posts();
        let pivot = JoinParameters::pivot(
            "post_user",
            PivotField::new("post_uuid", "uuid"),
            PivotField::new("user_uuid", "uuid"),
        );

        let err = criteria.join(publisher(), pivot).map(|_| ()).unwrap_err();
        assert_eq!(
            err,
            CriteriaError::JoinShapeMismatch {
                alias: "publisher".to_string(),
                relation: crate::schema::JoinRelationType::ManyToOne,
                shape: "pivot",
            }
        );
    }

    #[test]
    fn test_join_fields_are_schema_checked() {
        let mut criteria = posts();

        let bad_parent = criteria
            .join(publisher(), JoinParameters::simple("author_uuid", "uuid"))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            bad_parent,
            CriteriaError::SchemaViolation {
                field: "author_uuid".to_string(),
                source_name: "post".to_string(),
            }
        );

        let bad_child = criteria
            .join(publisher(), JoinParameters::simple("user_uuid", "id"))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            bad_child,
            CriteriaError::SchemaViolation {
                field: "id".to_string(),
                source_name: "user".to_string(),
            }
        );
        assert!(criteria.joins().is_empty());
    }

    #[test]
    fn test_joining_root_criteria_fails() {
        let mut criteria = posts();
        let root_user = Criteria::create(user_schema(), "publisher").unwrap();

        let err = criteria
            .join(root_user, JoinParameters::simple("user_uuid", "uuid"))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, CriteriaError::NotAJoin { .. }));
        assert!(err.is_structural());
    }

    #[test]
    fn test_pivot_join_resolves() {
        let mut users = Criteria::create(user_schema(), "users").unwrap();
        let permissions = Criteria::create_inner_join(permission_schema(), "permissions").unwrap();

        users
            .join(
                permissions,
                JoinParameters::pivot(
                    "user_permission_pivot_table",
                    PivotField::new("user_foreign_key", "uuid"),
                    PivotField::new("permission_foreign_key", "uuid"),
                ),
            )
            .unwrap();

        let entry = users.joins().get("permissions").unwrap();
        assert_eq!(entry.parameters().parent_alias, "users");
        assert_eq!(entry.parameters().parent_source_name, "user");
        assert!(entry.parameters().relation_type.is_pivot());
    }

    #[traced_test]
    #[test]
    fn test_join_alias_replacement_keeps_position() {
        let mut posts = posts();
        let comments = Criteria::create_left_join(
            crate::test_support::comment_schema(),
            "comments",
        )
        .unwrap();

        posts
            .join(publisher(), JoinParameters::simple("user_uuid", "uuid"))
            .unwrap()
            .join(comments, JoinParameters::simple("uuid", "post_uuid"))
            .unwrap();

        let mut second = Criteria::create_left_join(user_schema(), "publisher").unwrap();
        second.where_(eq("username", "admin")).unwrap();
        posts
            .join(second, JoinParameters::simple("uuid", "uuid"))
            .unwrap();

        assert_eq!(posts.joins().len(), 2);
        assert_eq!(posts.joins().aliases(), ["publisher", "comments"]);

        let entry = posts.joins().get("publisher").unwrap();
        assert_eq!(entry.criteria().kind(), CriteriaKind::LeftJoin);
        assert_eq!(entry.criteria().root_filter_group().len(), 1);
        assert_eq!(
            entry.parameters().parameters,
            JoinParameters::simple("uuid", "uuid")
        );
        assert!(logs_contain("replacing join"));
    }
}
