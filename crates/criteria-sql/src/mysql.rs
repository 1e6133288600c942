//! MySQL translator.
//!
//! Renders a root criteria to a single MySQL `SELECT` with:
//! - backtick-quoted identifiers (embedded backticks doubled)
//! - positional `?` placeholders, drained with [`MysqlTranslator::take_params`]
//! - one `JOIN` per simple join and two per pivot join
//! - joined filters appended to the join's `ON` condition
//!
//! `FULL OUTER JOIN` has no MySQL equivalent and is rejected.

use criteria_core::{
    Criteria, CriteriaVisitor, Cursor, Filter, FilterGroup, FilterOperator, FilterValue,
    JoinParameters, LogicalOperator, ResolvedJoin,
};
use serde_json::Value;
use tracing::debug;

use crate::config::{SkipWithoutTake, SqlTranslatorConfig};
use crate::error::{TranslateError, TranslateResult};

/// `IN` / `NOT IN` without items: never and always true.
///
/// A non-list value counts as an empty set.
pub(crate) fn empty_set_condition(filter: &Filter) -> Option<&'static str> {
    let operator = filter.operator();
    if !operator.is_set() {
        return None;
    }
    match filter.value().and_then(FilterValue::as_list) {
        Some(items) if !items.is_empty() => None,
        _ if operator == FilterOperator::In => Some("1=0"),
        _ => Some("1=1"),
    }
}

#[derive(Debug, Default)]
pub struct MysqlTranslator {
    config: SqlTranslatorConfig,
    params: Vec<Value>,
    order_by: Vec<String>,
}

impl MysqlTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SqlTranslatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SqlTranslatorConfig {
        &self.config
    }

    /// Parameters bound by the last translation, in placeholder order.
    /// Drains them.
    pub fn take_params(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.params)
    }

    fn quote(part: &str) -> String {
        format!("`{}`", part.replace('`', "``"))
    }

    fn column(alias: &str, field: &str) -> String {
        format!("{}.{}", Self::quote(alias), Self::quote(field))
    }

    fn bind(&mut self, value: Value) -> &'static str {
        self.params.push(value);
        "?"
    }

    /// `SELECT` columns of `criteria` and, depth first, of its joins
    fn collect_select(criteria: &Criteria, out: &mut Vec<String>) {
        out.extend(
            criteria
                .select()
                .iter()
                .map(|field| Self::column(criteria.alias(), field)),
        );
        for entry in criteria.joins() {
            Self::collect_select(entry.criteria(), out);
        }
    }

    fn push_orders(&mut self, criteria: &Criteria) {
        self.order_by.extend(criteria.orders().iter().map(|order| {
            format!(
                "{} {}",
                Self::column(criteria.alias(), order.field()),
                order.direction()
            )
        }));
    }

    fn join_clause(
        &mut self,
        keyword: &str,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
    ) -> TranslateResult<String> {
        let alias = criteria.alias();
        let table = Self::quote(criteria.source_name());

        let mut clause = match &parameters.parameters {
            JoinParameters::Simple(simple) => format!(
                "{keyword} {table} AS {} ON {} = {}",
                Self::quote(alias),
                Self::column(&parameters.parent_alias, &simple.parent_field),
                Self::column(alias, &simple.join_field),
            ),
            JoinParameters::Pivot(pivot) => {
                let pivot_alias = parameters.pivot_alias(alias, &self.config.pivot_alias_suffix);
                format!(
                    "{keyword} {} AS {} ON {} = {} {keyword} {table} AS {} ON {} = {}",
                    Self::quote(&pivot.pivot_source_name),
                    Self::quote(&pivot_alias),
                    Self::column(&parameters.parent_alias, &pivot.parent_field.reference),
                    Self::column(&pivot_alias, &pivot.parent_field.pivot_field),
                    Self::quote(alias),
                    Self::column(&pivot_alias, &pivot.join_field.pivot_field),
                    Self::column(alias, &pivot.join_field.reference),
                )
            }
        };

        let filters = criteria.root_filter_group().accept(self, alias)?;
        if !filters.is_empty() {
            clause.push_str(" AND ");
            clause.push_str(&filters);
        }

        self.push_orders(criteria);

        for entry in criteria.joins() {
            let nested = entry.accept(self, ())?;
            clause.push(' ');
            clause.push_str(&nested);
        }

        Ok(clause)
    }

    /// `((f1 op ?) OR (f1 = ? AND f2 op ?))`
    fn cursor_condition(&mut self, cursor: &Cursor, alias: &str) -> String {
        let [first, second] = cursor.filters();
        let op = first.operator();
        let first_column = Self::column(alias, first.field());
        let second_column = Self::column(alias, second.field());
        let first_value = first.value().map(FilterValue::to_json).unwrap_or(Value::Null);
        let second_value = second.value().map(FilterValue::to_json).unwrap_or(Value::Null);

        let bound = self.bind(first_value.clone());
        let tie = self.bind(first_value);
        let next = self.bind(second_value);

        format!(
            "(({first_column} {op} {bound}) OR ({first_column} = {tie} AND {second_column} {op} {next}))"
        )
    }

    fn limit_clause(&mut self, criteria: &Criteria) -> TranslateResult<String> {
        let mut clause = String::new();

        if criteria.take() > 0 {
            clause.push_str(" LIMIT ");
            clause.push_str(self.bind(Value::from(criteria.take())));
            if criteria.skip() > 0 {
                clause.push_str(" OFFSET ");
                clause.push_str(self.bind(Value::from(criteria.skip())));
            }
        } else if criteria.skip() > 0 {
            // MySQL has no OFFSET without LIMIT
            match self.config.skip_without_take {
                SkipWithoutTake::Omit => {
                    debug!(skip = criteria.skip(), "take is 0, omitting OFFSET");
                }
                SkipWithoutTake::Reject => {
                    return Err(TranslateError::Unsupported(format!(
                        "skip {} without take cannot be expressed in MySQL",
                        criteria.skip()
                    )));
                }
            }
        }

        Ok(clause)
    }

    fn render_group(
        &mut self,
        group: &FilterGroup,
        alias: &str,
        operator: LogicalOperator,
    ) -> TranslateResult<String> {
        let mut conditions = Vec::with_capacity(group.len());
        for item in group.items() {
            let condition = item.accept(self, alias)?;
            if !condition.is_empty() {
                conditions.push(condition);
            }
        }

        if conditions.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "({})",
            conditions.join(&format!(" {} ", operator))
        ))
    }

    fn text_value(filter: &Filter) -> String {
        filter.value().map(ToString::to_string).unwrap_or_default()
    }
}

impl CriteriaVisitor for MysqlTranslator {
    type Context = ();
    type Output = String;
    type FilterOutput = String;
    type Error = TranslateError;

    fn visit_root(&mut self, criteria: &Criteria, _context: ()) -> TranslateResult<String> {
        self.params.clear();
        self.order_by.clear();

        debug!(alias = %criteria.alias(), joins = criteria.joins().len(), "translating criteria to MySQL");

        // An empty root selection selects every column
        let mut select = if criteria.select().is_empty() {
            vec!["*".to_string()]
        } else {
            Vec::new()
        };
        Self::collect_select(criteria, &mut select);

        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            select.join(", "),
            Self::quote(criteria.source_name()),
            Self::quote(criteria.alias())
        );

        self.push_orders(criteria);

        for entry in criteria.joins() {
            let clause = entry.accept(self, ())?;
            sql.push(' ');
            sql.push_str(&clause);
        }

        let mut conditions = Vec::new();
        let filters = criteria
            .root_filter_group()
            .accept(self, criteria.alias())?;
        if !filters.is_empty() {
            conditions.push(filters);
        }
        if let Some(cursor) = criteria.cursor() {
            conditions.push(self.cursor_condition(cursor, criteria.alias()));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        let limit = self.limit_clause(criteria)?;
        sql.push_str(&limit);
        sql.push(';');

        debug!(params = self.params.len(), "MySQL translation finished");
        Ok(sql)
    }

    fn visit_inner_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        _context: (),
    ) -> TranslateResult<String> {
        self.join_clause("INNER JOIN", criteria, parameters)
    }

    fn visit_left_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        _context: (),
    ) -> TranslateResult<String> {
        self.join_clause("LEFT JOIN", criteria, parameters)
    }

    fn visit_outer_join(
        &mut self,
        criteria: &Criteria,
        _parameters: &ResolvedJoin,
        _context: (),
    ) -> TranslateResult<String> {
        Err(TranslateError::Unsupported(format!(
            "FULL OUTER JOIN '{}' is not supported by MySQL; it needs a UNION of LEFT and RIGHT joins",
            criteria.alias()
        )))
    }

    fn visit_filter(&mut self, filter: &Filter, alias: &str) -> TranslateResult<String> {
        if let Some(constant) = empty_set_condition(filter) {
            return Ok(constant.to_string());
        }

        let column = Self::column(alias, filter.field());
        let value = filter.value().map(FilterValue::to_json).unwrap_or(Value::Null);

        let sql = match filter.operator() {
            op @ (FilterOperator::Equals
            | FilterOperator::NotEquals
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEquals
            | FilterOperator::LessThan
            | FilterOperator::LessThanOrEquals
            | FilterOperator::Like
            | FilterOperator::NotLike) => format!("{column} {op} {}", self.bind(value)),
            op @ (FilterOperator::Contains | FilterOperator::NotContains) => {
                let keyword = if op == FilterOperator::Contains {
                    "LIKE"
                } else {
                    "NOT LIKE"
                };
                let value = if self.config.wrap_contains {
                    Value::String(format!("%{}%", Self::text_value(filter)))
                } else {
                    value
                };
                format!("{column} {keyword} {}", self.bind(value))
            }
            FilterOperator::StartsWith => {
                let pattern = Value::String(format!("{}%", Self::text_value(filter)));
                format!("{column} LIKE {}", self.bind(pattern))
            }
            FilterOperator::EndsWith => {
                let pattern = Value::String(format!("%{}", Self::text_value(filter)));
                format!("{column} LIKE {}", self.bind(pattern))
            }
            op @ (FilterOperator::In | FilterOperator::NotIn) => {
                let items = filter
                    .value()
                    .and_then(FilterValue::as_list)
                    .unwrap_or_default();
                let placeholders: Vec<&str> =
                    items.iter().map(|item| self.bind(item.to_json())).collect();
                format!("{column} {op} ({})", placeholders.join(", "))
            }
            FilterOperator::IsNull => format!("{column} IS NULL"),
            FilterOperator::IsNotNull => format!("{column} IS NOT NULL"),
        };

        Ok(sql)
    }

    fn visit_and_group(&mut self, group: &FilterGroup, alias: &str) -> TranslateResult<String> {
        self.render_group(group, alias, LogicalOperator::And)
    }

    fn visit_or_group(&mut self, group: &FilterGroup, alias: &str) -> TranslateResult<String> {
        self.render_group(group, alias, LogicalOperator::Or)
    }
}
