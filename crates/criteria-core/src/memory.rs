//! In-memory evaluation of criteria.
//!
//! [`MemoryTranslator`] compiles a root criteria into a [`RowMatcher`] that
//! filters, sorts and pages rows held as JSON objects. Comparisons follow SQL
//! conventions: a null or missing cell never satisfies a comparison, and
//! only `IS NULL` matches it. There is no relational data in memory, so
//! joins are rejected.

use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::debug;

use crate::criteria::Criteria;
use crate::cursor::Cursor;
use crate::error::{CriteriaError, CriteriaResult};
use crate::filter::Filter;
use crate::group::FilterGroup;
use crate::join::ResolvedJoin;
use crate::operator::FilterOperator;
use crate::order::{Order, OrderDirection};
use crate::value::FilterValue;
use crate::visitor::CriteriaVisitor;

/// A row: field name to JSON value
pub type Row = Map<String, Value>;

/// Compiled filter tree
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        field: String,
        operator: FilterOperator,
        value: Option<Value>,
    },
    Pattern {
        field: String,
        pattern: Regex,
        negated: bool,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Self::Compare {
                field,
                operator,
                value,
            } => compare(cell(row, field), *operator, value.as_ref()),
            Self::Pattern {
                field,
                pattern,
                negated,
            } => match cell(row, field) {
                Value::String(text) => pattern.is_match(text) != *negated,
                Value::Null => false,
                other => pattern.is_match(&other.to_string()) != *negated,
            },
            Self::All(items) => items.iter().all(|p| p.eval(row)),
            Self::Any(items) => items.iter().any(|p| p.eval(row)),
        }
    }
}

/// Compiled root criteria
#[derive(Debug, Clone)]
pub struct RowMatcher {
    predicate: Predicate,
    cursor: Option<Predicate>,
    orders: Vec<Order>,
    take: usize,
    skip: usize,
}

impl RowMatcher {
    /// Whether a row passes the filters and the cursor bound
    pub fn matches(&self, row: &Row) -> bool {
        self.predicate.eval(row) && self.cursor.as_ref().map_or(true, |c| c.eval(row))
    }

    /// Filter, sort and page `rows`.
    ///
    /// `skip` only applies together with a non-zero `take`.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut selected: Vec<&Row> = rows.into_iter().filter(|row| self.matches(row)).collect();

        if !self.orders.is_empty() {
            selected.sort_by(|a, b| self.compare_rows(a, b));
        }

        if self.take == 0 {
            return selected;
        }

        selected.into_iter().skip(self.skip).take(self.take).collect()
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for order in &self.orders {
            let ordering = order_values(cell(a, order.field()), cell(b, order.field()));
            let ordering = match order.direction() {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Translator producing [`RowMatcher`]s
#[derive(Debug, Default)]
pub struct MemoryTranslator;

impl MemoryTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Compile a bare filter group, without paging or ordering
    pub fn compile_group(&mut self, group: &FilterGroup, alias: &str) -> CriteriaResult<RowMatcher> {
        Ok(RowMatcher {
            predicate: group.accept(self, alias)?,
            cursor: None,
            orders: Vec::new(),
            take: 0,
            skip: 0,
        })
    }

    fn compile_cursor(&mut self, cursor: &Cursor, alias: &str) -> CriteriaResult<Predicate> {
        let [first, second] = cursor.filters();
        let first_bound = self.visit_filter(first, alias)?;
        let second_bound = self.visit_filter(second, alias)?;
        let first_equal = Predicate::Compare {
            field: first.field().to_string(),
            operator: FilterOperator::Equals,
            value: first.value().map(FilterValue::to_json),
        };

        Ok(Predicate::Any(vec![
            first_bound,
            Predicate::All(vec![first_equal, second_bound]),
        ]))
    }

    fn group_items(&mut self, group: &FilterGroup, alias: &str) -> CriteriaResult<Vec<Predicate>> {
        group.items().iter().map(|item| item.accept(self, alias)).collect()
    }

    fn unsupported_join(criteria: &Criteria) -> CriteriaError {
        CriteriaError::UnsupportedOperation(format!(
            "join '{}' cannot be evaluated in memory",
            criteria.alias()
        ))
    }
}

impl CriteriaVisitor for MemoryTranslator {
    type Context = ();
    type Output = RowMatcher;
    type FilterOutput = Predicate;
    type Error = CriteriaError;

    fn visit_root(&mut self, criteria: &Criteria, _context: ()) -> CriteriaResult<RowMatcher> {
        if let Some(entry) = criteria.joins().iter().next() {
            return Err(Self::unsupported_join(entry.criteria()));
        }

        let predicate = criteria.root_filter_group().accept(self, criteria.alias())?;
        let cursor = criteria
            .cursor()
            .map(|cursor| self.compile_cursor(cursor, criteria.alias()))
            .transpose()?;

        if criteria.take() == 0 && criteria.skip() > 0 {
            debug!(skip = criteria.skip(), "skip ignored without take");
        }

        Ok(RowMatcher {
            predicate,
            cursor,
            orders: criteria.orders().to_vec(),
            take: criteria.take(),
            skip: criteria.skip(),
        })
    }

    fn visit_inner_join(
        &mut self,
        criteria: &Criteria,
        _parameters: &ResolvedJoin,
        _context: (),
    ) -> CriteriaResult<RowMatcher> {
        Err(Self::unsupported_join(criteria))
    }

    fn visit_left_join(
        &mut self,
        criteria: &Criteria,
        _parameters: &ResolvedJoin,
        _context: (),
    ) -> CriteriaResult<RowMatcher> {
        Err(Self::unsupported_join(criteria))
    }

    fn visit_outer_join(
        &mut self,
        criteria: &Criteria,
        _parameters: &ResolvedJoin,
        _context: (),
    ) -> CriteriaResult<RowMatcher> {
        Err(Self::unsupported_join(criteria))
    }

    fn visit_filter(&mut self, filter: &Filter, _alias: &str) -> CriteriaResult<Predicate> {
        let field = filter.field().to_string();
        let text = filter.value().map(ToString::to_string).unwrap_or_default();

        let pattern = match filter.operator() {
            FilterOperator::Like | FilterOperator::NotLike => Some(like_to_regex(&text)),
            FilterOperator::Contains | FilterOperator::NotContains => {
                Some(format!("(?s)^.*{}.*$", regex::escape(&text)))
            }
            FilterOperator::StartsWith => Some(format!("(?s)^{}", regex::escape(&text))),
            FilterOperator::EndsWith => Some(format!("(?s){}$", regex::escape(&text))),
            _ => None,
        };

        match pattern {
            Some(pattern) => Ok(Predicate::Pattern {
                field,
                pattern: Regex::new(&pattern)
                    .map_err(|e| CriteriaError::UnsupportedOperation(e.to_string()))?,
                negated: matches!(
                    filter.operator(),
                    FilterOperator::NotLike | FilterOperator::NotContains
                ),
            }),
            None => Ok(Predicate::Compare {
                field,
                operator: filter.operator(),
                value: filter.value().map(FilterValue::to_json),
            }),
        }
    }

    fn visit_and_group(&mut self, group: &FilterGroup, alias: &str) -> CriteriaResult<Predicate> {
        Ok(Predicate::All(self.group_items(group, alias)?))
    }

    fn visit_or_group(&mut self, group: &FilterGroup, alias: &str) -> CriteriaResult<Predicate> {
        // An empty group contributes no condition
        if group.is_empty() {
            return Ok(Predicate::All(Vec::new()));
        }
        Ok(Predicate::Any(self.group_items(group, alias)?))
    }
}

/// SQL `LIKE` pattern (`%`, `_`) as an anchored regex
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?s)^");
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '%' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

static NULL: Value = Value::Null;

fn cell<'a>(row: &'a Row, field: &str) -> &'a Value {
    row.get(field).unwrap_or(&NULL)
}

fn compare(cell: &Value, operator: FilterOperator, value: Option<&Value>) -> bool {
    if operator.is_unary() {
        return cell.is_null() == (operator == FilterOperator::IsNull);
    }

    if operator.is_set() {
        let items = match value {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        if items.is_empty() {
            return operator == FilterOperator::NotIn;
        }
        if cell.is_null() {
            return false;
        }
        let found = items
            .iter()
            .any(|item| order_scalars(cell, item) == Some(Ordering::Equal));
        return found == (operator == FilterOperator::In);
    }

    let Some(value) = value else {
        return false;
    };
    let Some(ordering) = order_scalars(cell, value) else {
        return false;
    };
    match operator {
        FilterOperator::Equals => ordering == Ordering::Equal,
        FilterOperator::NotEquals => ordering != Ordering::Equal,
        FilterOperator::GreaterThan => ordering == Ordering::Greater,
        FilterOperator::GreaterThanOrEquals => ordering != Ordering::Less,
        FilterOperator::LessThan => ordering == Ordering::Less,
        FilterOperator::LessThanOrEquals => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Ordering of two non-null scalars of the same kind; numbers compare
/// numerically across integer and float
fn order_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Nulls first; mismatched kinds keep their relative position.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => order_scalars(a, b).unwrap_or(Ordering::Equal),
    }
}
