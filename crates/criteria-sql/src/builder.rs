//! Query-builder translator.
//!
//! Produces a [`QueryPlan`]: the ordered builder calls an ORM-style
//! `SELECT` builder needs, with named parameters (`param_0`, `param_1`, ...)
//! referenced as `:name` in conditions and `(:...name)` for list expansion.
//! Joins are addressed by relation path (`parent_alias.join_alias`); the
//! builder is expected to know the relation's columns.

use criteria_core::{
    Criteria, CriteriaVisitor, Cursor, Filter, FilterGroup, FilterOperator, FilterValue,
    LogicalOperator, OrderDirection, ResolvedJoin,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{SkipWithoutTake, SqlTranslatorConfig};
use crate::error::{TranslateError, TranslateResult};
use crate::mysql::empty_set_condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
}

/// One builder method call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BuilderCall {
    Select {
        columns: Vec<String>,
    },
    Where {
        condition: String,
    },
    AndWhere {
        condition: String,
    },
    /// Join the relation and select its columns
    JoinAndSelect {
        kind: JoinKind,
        relation: String,
        alias: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    OrderBy {
        column: String,
        direction: OrderDirection,
    },
    AddOrderBy {
        column: String,
        direction: OrderDirection,
    },
    Take {
        count: usize,
    },
    Skip {
        count: usize,
    },
}

/// Builder calls plus the named parameters they reference
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    pub calls: Vec<BuilderCall>,
    pub parameters: Vec<(String, Value)>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Default)]
pub struct BuilderTranslator {
    config: SqlTranslatorConfig,
    param_counter: usize,
    parameters: Vec<(String, Value)>,
    selects: Vec<String>,
}

impl BuilderTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SqlTranslatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("param_{}", self.param_counter);
        self.param_counter += 1;
        self.parameters.push((name.clone(), value));
        name
    }

    fn add_select(&mut self, column: String) {
        if !self.selects.contains(&column) {
            self.selects.push(column);
        }
    }

    // Explicit selections also select order columns; select-all or an empty
    // selection selects the alias.
    fn resolve_selects(&mut self, criteria: &Criteria) {
        let alias = criteria.alias();
        if criteria.is_select_all() || criteria.select().is_empty() {
            self.add_select(alias.to_string());
            return;
        }
        for order in criteria.orders() {
            self.add_select(format!("{}.{}", alias, order.field()));
        }
        for field in criteria.select() {
            self.add_select(format!("{}.{}", alias, field));
        }
    }

    fn cursor_condition(&mut self, cursor: &Cursor, alias: &str) -> String {
        let [first, second] = cursor.filters();
        let op = first.operator();
        let first_param = self.bind(first.value().map(FilterValue::to_json).unwrap_or(Value::Null));
        let second_param =
            self.bind(second.value().map(FilterValue::to_json).unwrap_or(Value::Null));
        let first_column = format!("{}.{}", alias, first.field());
        let second_column = format!("{}.{}", alias, second.field());

        format!(
            "(({first_column} {op} :{first_param}) OR ({first_column} = :{first_param} AND {second_column} {op} :{second_param}))"
        )
    }

    fn paging(&mut self, criteria: &Criteria, plan: &mut QueryPlan) -> TranslateResult<()> {
        if criteria.take() > 0 {
            plan.calls.push(BuilderCall::Take {
                count: criteria.take(),
            });
            if criteria.skip() > 0 {
                plan.calls.push(BuilderCall::Skip {
                    count: criteria.skip(),
                });
            }
            return Ok(());
        }

        if criteria.skip() > 0 {
            match self.config.skip_without_take {
                SkipWithoutTake::Omit => {
                    debug!(skip = criteria.skip(), "take is 0, omitting skip");
                }
                SkipWithoutTake::Reject => {
                    return Err(TranslateError::Unsupported(format!(
                        "skip {} without take",
                        criteria.skip()
                    )));
                }
            }
        }
        Ok(())
    }

    fn join(
        &mut self,
        kind: JoinKind,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        mut plan: QueryPlan,
    ) -> TranslateResult<QueryPlan> {
        let alias = criteria.alias();
        let condition = criteria.root_filter_group().accept(self, alias)?;

        plan.calls.push(BuilderCall::JoinAndSelect {
            kind,
            relation: format!("{}.{}", parameters.parent_alias, alias),
            alias: alias.to_string(),
            condition: (!condition.is_empty()).then_some(condition),
        });

        self.resolve_selects(criteria);

        for order in criteria.orders() {
            plan.calls.push(BuilderCall::AddOrderBy {
                column: format!("{}.{}", alias, order.field()),
                direction: order.direction(),
            });
        }

        for entry in criteria.joins() {
            plan = entry.accept(self, plan)?;
        }

        Ok(plan)
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
        Ok(format!("({})", conditions.join(&format!(" {} ", operator))))
    }
}

impl CriteriaVisitor for BuilderTranslator {
    type Context = QueryPlan;
    type Output = QueryPlan;
    type FilterOutput = String;
    type Error = TranslateError;

    fn visit_root(&mut self, criteria: &Criteria, mut plan: QueryPlan) -> TranslateResult<QueryPlan> {
        self.param_counter = 0;
        self.parameters.clear();
        self.selects.clear();

        debug!(alias = %criteria.alias(), joins = criteria.joins().len(), "building query plan");

        self.resolve_selects(criteria);

        let alias = criteria.alias();
        let filters = criteria.root_filter_group().accept(self, alias)?;
        let has_filters = !filters.is_empty();
        if has_filters {
            plan.calls.push(BuilderCall::Where { condition: filters });
        }

        if let Some(cursor) = criteria.cursor() {
            let condition = self.cursor_condition(cursor, alias);
            plan.calls.push(if has_filters {
                BuilderCall::AndWhere { condition }
            } else {
                BuilderCall::Where { condition }
            });
        }

        for (index, order) in criteria.orders().iter().enumerate() {
            let column = format!("{}.{}", alias, order.field());
            let direction = order.direction();
            plan.calls.push(if index == 0 && criteria.cursor().is_none() {
                BuilderCall::OrderBy { column, direction }
            } else {
                BuilderCall::AddOrderBy { column, direction }
            });
        }

        self.paging(criteria, &mut plan)?;

        for entry in criteria.joins() {
            plan = entry.accept(self, plan)?;
        }

        plan.calls.insert(
            0,
            BuilderCall::Select {
                columns: std::mem::take(&mut self.selects),
            },
        );
        plan.parameters.append(&mut self.parameters);

        debug!(
            calls = plan.calls.len(),
            params = plan.parameters.len(),
            "query plan built"
        );
        Ok(plan)
    }

    fn visit_inner_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        plan: QueryPlan,
    ) -> TranslateResult<QueryPlan> {
        self.join(JoinKind::Inner, criteria, parameters, plan)
    }

    fn visit_left_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        plan: QueryPlan,
    ) -> TranslateResult<QueryPlan> {
        self.join(JoinKind::Left, criteria, parameters, plan)
    }

    fn visit_outer_join(
        &mut self,
        criteria: &Criteria,
        _parameters: &ResolvedJoin,
        _plan: QueryPlan,
    ) -> TranslateResult<QueryPlan> {
        Err(TranslateError::Unsupported(format!(
            "FULL OUTER JOIN '{}' has no query-builder equivalent",
            criteria.alias()
        )))
    }

    fn visit_filter(&mut self, filter: &Filter, alias: &str) -> TranslateResult<String> {
        if let Some(constant) = empty_set_condition(filter) {
            return Ok(constant.to_string());
        }

        let column = format!("{}.{}", alias, filter.field());
        let value = filter.value().map(FilterValue::to_json).unwrap_or(Value::Null);
        let text = filter.value().map(ToString::to_string).unwrap_or_default();

        let condition = match filter.operator() {
            op @ (FilterOperator::Equals
            | FilterOperator::NotEquals
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEquals
            | FilterOperator::LessThan
            | FilterOperator::LessThanOrEquals) => {
                format!("{column} {op} :{}", self.bind(value))
            }
            FilterOperator::Like => format!("{column} LIKE :{}", self.bind(Value::String(text))),
            FilterOperator::NotLike => {
                format!("{column} NOT LIKE :{}", self.bind(Value::String(text)))
            }
            op @ (FilterOperator::Contains | FilterOperator::NotContains) => {
                let keyword = if op == FilterOperator::Contains {
                    "LIKE"
                } else {
                    "NOT LIKE"
                };
                let pattern = if self.config.wrap_contains {
                    format!("%{text}%")
                } else {
                    text
                };
                format!("{column} {keyword} :{}", self.bind(Value::String(pattern)))
            }
            FilterOperator::StartsWith => {
                format!("{column} LIKE :{}", self.bind(Value::String(format!("{text}%"))))
            }
            FilterOperator::EndsWith => {
                format!("{column} LIKE :{}", self.bind(Value::String(format!("%{text}"))))
            }
            op @ (FilterOperator::In | FilterOperator::NotIn) => {
                format!("{column} {op} (:...{})", self.bind(value))
            }
            FilterOperator::IsNull => format!("{column} IS NULL"),
            FilterOperator::IsNotNull => format!("{column} IS NOT NULL"),
        };

        Ok(condition)
    }

    fn visit_and_group(&mut self, group: &FilterGroup, alias: &str) -> TranslateResult<String> {
        self.render_group(group, alias, LogicalOperator::And)
    }

    fn visit_or_group(&mut self, group: &FilterGroup, alias: &str) -> TranslateResult<String> {
        self.render_group(group, alias, LogicalOperator::Or)
    }
}
