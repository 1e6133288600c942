//! AND/OR filter trees.
//!
//! A [`FilterGroup`] is immutable and always normalized. Composition through
//! [`FilterGroup::add_and`] and [`FilterGroup::add_or`] builds the
//! sum-of-products shape a left-to-right `where / and_where / or_where`
//! chain reads as: `OR(AND(..), AND(..), ..)`, where every `and_where`
//! extends the most recently opened AND branch and every `or_where` opens a
//! new one.

use serde::{Deserialize, Serialize};

use crate::filter::{Filter, FilterPrimitive};
use crate::operator::LogicalOperator;
use crate::visitor::CriteriaVisitor;

/// Plain, serializable filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroupPrimitive {
    pub logical_operator: LogicalOperator,
    pub items: Vec<FilterItemPrimitive>,
}

impl FilterGroupPrimitive {
    pub fn new(logical_operator: LogicalOperator, items: Vec<FilterItemPrimitive>) -> Self {
        Self {
            logical_operator,
            items,
        }
    }

    pub fn and(items: Vec<FilterItemPrimitive>) -> Self {
        Self::new(LogicalOperator::And, items)
    }

    pub fn or(items: Vec<FilterItemPrimitive>) -> Self {
        Self::new(LogicalOperator::Or, items)
    }

    /// Canonical "no filter" state
    pub fn empty() -> Self {
        Self::and(Vec::new())
    }
}

/// Item of a [`FilterGroupPrimitive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterItemPrimitive {
    Group(FilterGroupPrimitive),
    Filter(FilterPrimitive),
}

impl From<FilterPrimitive> for FilterItemPrimitive {
    fn from(filter: FilterPrimitive) -> Self {
        Self::Filter(filter)
    }
}

impl From<FilterGroupPrimitive> for FilterItemPrimitive {
    fn from(group: FilterGroupPrimitive) -> Self {
        Self::Group(group)
    }
}

/// Normalize a filter tree.
///
/// - children are normalized first
/// - empty child groups are dropped
/// - a child group with the parent's operator is flattened into the parent
/// - a single remaining group item replaces the parent
/// - a single remaining filter keeps the parent operator
/// - no remaining items yields an empty AND
///
/// The output is a fixed point: `normalize(normalize(g)) == normalize(g)`.
pub fn normalize(group: FilterGroupPrimitive) -> FilterGroupPrimitive {
    let operator = group.logical_operator;
    let mut items = Vec::with_capacity(group.items.len());

    for item in group.items {
        match item {
            FilterItemPrimitive::Filter(filter) => items.push(FilterItemPrimitive::Filter(filter)),
            FilterItemPrimitive::Group(child) => {
                let child = normalize(child);
                if child.items.is_empty() {
                    continue;
                }
                if child.logical_operator == operator {
                    items.extend(child.items);
                } else {
                    items.push(FilterItemPrimitive::Group(child));
                }
            }
        }
    }

    if items.is_empty() {
        return FilterGroupPrimitive::empty();
    }

    // Absorption: a lone group replaces its parent
    if let [FilterItemPrimitive::Group(_)] = items.as_slice() {
        if let Some(FilterItemPrimitive::Group(only)) = items.pop() {
            return only;
        }
    }

    FilterGroupPrimitive::new(operator, items)
}

/// Item of a [`FilterGroup`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterItem {
    Filter(Filter),
    Group(FilterGroup),
}

impl FilterItem {
    pub fn to_primitive(&self) -> FilterItemPrimitive {
        match self {
            Self::Filter(filter) => FilterItemPrimitive::Filter(filter.to_primitive()),
            Self::Group(group) => FilterItemPrimitive::Group(group.to_primitive()),
        }
    }

    pub fn accept<V>(&self, visitor: &mut V, alias: &str) -> Result<V::FilterOutput, V::Error>
    where
        V: CriteriaVisitor + ?Sized,
    {
        match self {
            Self::Filter(filter) => filter.accept(visitor, alias),
            Self::Group(group) => group.accept(visitor, alias),
        }
    }
}

/// Immutable, normalized AND/OR tree of filters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    logical_operator: LogicalOperator,
    items: Vec<FilterItem>,
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self {
            logical_operator: LogicalOperator::And,
            items: Vec::new(),
        }
    }
}

impl FilterGroup {
    /// Build a group from a primitive tree, normalizing it
    pub fn new(primitive: FilterGroupPrimitive) -> Self {
        Self::from_normalized(normalize(primitive))
    }

    // Normalized trees are fixed points, so children are not normalized again.
    fn from_normalized(primitive: FilterGroupPrimitive) -> Self {
        let items = primitive
            .items
            .into_iter()
            .map(|item| match item {
                FilterItemPrimitive::Filter(filter) => FilterItem::Filter(Filter::new(filter)),
                FilterItemPrimitive::Group(group) => FilterItem::Group(Self::from_normalized(group)),
            })
            .collect();

        Self {
            logical_operator: primitive.logical_operator,
            items,
        }
    }

    /// `AND[filter]`
    pub fn create_initial(filter: FilterPrimitive) -> Self {
        Self::new(FilterGroupPrimitive::and(vec![filter.into()]))
    }

    pub fn logical_operator(&self) -> LogicalOperator {
        self.logical_operator
    }

    pub fn items(&self) -> &[FilterItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn to_primitive(&self) -> FilterGroupPrimitive {
        FilterGroupPrimitive::new(
            self.logical_operator,
            self.items.iter().map(FilterItem::to_primitive).collect(),
        )
    }

    /// New group with `filter` AND-ed onto the most recent branch.
    ///
    /// On an AND group the filter is appended. On an OR group the last item
    /// decides: an AND branch grows, a bare filter is promoted to
    /// `AND[last, filter]`, anything else gets a new `AND[filter]` branch.
    pub fn add_and(&self, filter: FilterPrimitive) -> Self {
        let mut primitive = self.to_primitive();

        match primitive.logical_operator {
            LogicalOperator::And => primitive.items.push(filter.into()),
            LogicalOperator::Or => match primitive.items.pop() {
                Some(FilterItemPrimitive::Group(mut last))
                    if last.logical_operator == LogicalOperator::And =>
                {
                    last.items.push(filter.into());
                    primitive.items.push(last.into());
                }
                Some(FilterItemPrimitive::Filter(last)) => {
                    primitive
                        .items
                        .push(FilterGroupPrimitive::and(vec![last.into(), filter.into()]).into());
                }
                Some(other) => {
                    primitive.items.push(other);
                    primitive
                        .items
                        .push(FilterGroupPrimitive::and(vec![filter.into()]).into());
                }
                None => primitive
                    .items
                    .push(FilterGroupPrimitive::and(vec![filter.into()]).into()),
            },
        }

        Self::new(primitive)
    }

    /// New group with `filter` opening a new OR branch.
    pub fn add_or(&self, filter: FilterPrimitive) -> Self {
        let branch = FilterGroupPrimitive::and(vec![filter.into()]).into();
        let primitive = self.to_primitive();

        let items = match primitive.logical_operator {
            LogicalOperator::And if primitive.items.is_empty() => vec![branch],
            LogicalOperator::And => vec![FilterGroupPrimitive::and(primitive.items).into(), branch],
            LogicalOperator::Or => {
                let mut items = primitive.items;
                items.push(branch);
                items
            }
        };

        Self::new(FilterGroupPrimitive::or(items))
    }

    pub fn accept<V>(&self, visitor: &mut V, alias: &str) -> Result<V::FilterOutput, V::Error>
    where
        V: CriteriaVisitor + ?Sized,
    {
        match self.logical_operator {
            LogicalOperator::And => visitor.visit_and_group(self, alias),
            LogicalOperator::Or => visitor.visit_or_group(self, alias),
        }
    }
}

impl From<FilterGroupPrimitive> for FilterGroup {
    fn from(primitive: FilterGroupPrimitive) -> Self {
        Self::new(primitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::FilterOperator;
    use proptest::prelude::*;

    fn f(field: &str) -> FilterPrimitive {
        FilterPrimitive::new(field, FilterOperator::Equals, field)
    }

    fn item(field: &str) -> FilterItemPrimitive {
        f(field).into()
    }

    #[test]
    fn test_flattening() {
        let raw = FilterGroupPrimitive::and(vec![
            FilterGroupPrimitive::and(vec![item("a"), item("b")]).into(),
            item("c"),
        ]);

        assert_eq!(
            normalize(raw),
            FilterGroupPrimitive::and(vec![item("a"), item("b"), item("c")])
        );
    }

    #[test]
    fn test_absorption() {
        let raw = FilterGroupPrimitive::and(vec![
            FilterGroupPrimitive::or(vec![item("a"), item("b")]).into(),
        ]);

        assert_eq!(
            normalize(raw),
            FilterGroupPrimitive::or(vec![item("a"), item("b")])
        );
    }

    #[test]
    fn test_empty_pruning() {
        let raw = FilterGroupPrimitive::and(vec![FilterGroupPrimitive::empty().into(), item("a")]);

        assert_eq!(normalize(raw), FilterGroupPrimitive::and(vec![item("a")]));
    }

    #[test]
    fn test_single_filter_keeps_parent_operator() {
        let raw = FilterGroupPrimitive::or(vec![item("a")]);
        assert_eq!(normalize(raw.clone()), raw);
    }

    #[test]
    fn test_nothing_left_is_empty_and() {
        let raw = FilterGroupPrimitive::or(vec![
            FilterGroupPrimitive::or(Vec::new()).into(),
            FilterGroupPrimitive::and(vec![FilterGroupPrimitive::empty().into()]).into(),
        ]);

        let group = FilterGroup::new(raw);
        assert!(group.is_empty());
        assert_eq!(group.logical_operator(), LogicalOperator::And);
        assert_eq!(group, FilterGroup::default());
    }

    #[test]
    fn test_add_and_composition() {
        let group = FilterGroup::create_initial(f("a"))
            .add_and(f("b"))
            .add_and(f("c"));

        assert_eq!(
            group.to_primitive(),
            FilterGroupPrimitive::and(vec![item("a"), item("b"), item("c")])
        );
    }

    #[test]
    fn test_add_or_opens_branch() {
        let group = FilterGroup::create_initial(f("a")).add_or(f("b"));

        assert_eq!(
            group.to_primitive(),
            FilterGroupPrimitive::or(vec![
                FilterGroupPrimitive::and(vec![item("a")]).into(),
                FilterGroupPrimitive::and(vec![item("b")]).into(),
            ])
        );
    }

    #[test]
    fn test_and_then_or() {
        let group = FilterGroup::create_initial(f("a"))
            .add_and(f("b"))
            .add_or(f("c"));

        assert_eq!(
            group.to_primitive(),
            FilterGroupPrimitive::or(vec![
                FilterGroupPrimitive::and(vec![item("a"), item("b")]).into(),
                FilterGroupPrimitive::and(vec![item("c")]).into(),
            ])
        );
    }

    #[test]
    fn test_or_then_and_extends_last_branch() {
        let group = FilterGroup::create_initial(f("a"))
            .add_or(f("b"))
            .add_and(f("c"));

        assert_eq!(
            group.to_primitive(),
            FilterGroupPrimitive::or(vec![
                FilterGroupPrimitive::and(vec![item("a")]).into(),
                FilterGroupPrimitive::and(vec![item("b"), item("c")]).into(),
            ])
        );
    }

    #[test]
    fn test_add_and_promotes_bare_last_filter() {
        let group = FilterGroup::new(FilterGroupPrimitive::or(vec![
            FilterGroupPrimitive::and(vec![item("a"), item("b")]).into(),
            item("c"),
        ]));

        assert_eq!(
            group.add_and(f("d")).to_primitive(),
            FilterGroupPrimitive::or(vec![
                FilterGroupPrimitive::and(vec![item("a"), item("b")]).into(),
                FilterGroupPrimitive::and(vec![item("c"), item("d")]).into(),
            ])
        );
    }

    #[test]
    fn test_add_or_on_empty_group_is_single_branch() {
        let group = FilterGroup::default().add_or(f("a"));

        assert_eq!(
            group.to_primitive(),
            FilterGroupPrimitive::and(vec![item("a")])
        );
    }

    #[test]
    fn test_receiver_is_untouched() {
        let original = FilterGroup::create_initial(f("a"));
        let _ = original.add_and(f("b"));
        let _ = original.add_or(f("c"));

        assert_eq!(original.to_primitive(), FilterGroupPrimitive::and(vec![item("a")]));
    }

    #[test]
    fn test_primitive_json_shape() {
        let group = FilterGroup::create_initial(f("a")).add_or(f("b"));
        insta::assert_json_snapshot!(group.to_primitive(), @r###"
        {
          "logical_operator": "OR",
          "items": [
            {
              "logical_operator": "AND",
              "items": [
                {
                  "field": "a",
                  "operator": "=",
                  "value": "a"
                }
              ]
            },
            {
              "logical_operator": "AND",
              "items": [
                {
                  "field": "b",
                  "operator": "=",
                  "value": "b"
                }
              ]
            }
          ]
        }
        "###);
    }

    fn arb_item() -> impl Strategy<Value = FilterItemPrimitive> {
        let leaf = prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(item);

        leaf.prop_recursive(4, 32, 4, |inner| {
            (any::<bool>(), prop::collection::vec(inner, 0..4)).prop_map(|(and, items)| {
                let operator = if and {
                    LogicalOperator::And
                } else {
                    LogicalOperator::Or
                };
                FilterGroupPrimitive::new(operator, items).into()
            })
        })
    }

    fn arb_group() -> impl Strategy<Value = FilterGroupPrimitive> {
        (any::<bool>(), prop::collection::vec(arb_item(), 0..4)).prop_map(|(and, items)| {
            let operator = if and {
                LogicalOperator::And
            } else {
                LogicalOperator::Or
            };
            FilterGroupPrimitive::new(operator, items)
        })
    }

    fn assert_canonical(group: &FilterGroupPrimitive, is_root: bool) {
        if group.items.is_empty() {
            assert!(is_root, "empty group below the root");
            assert_eq!(group.logical_operator, LogicalOperator::And);
        }
        if group.items.len() == 1 {
            assert!(matches!(group.items[0], FilterItemPrimitive::Filter(_)));
        }
        for child in &group.items {
            if let FilterItemPrimitive::Group(child) = child {
                assert_ne!(child.logical_operator, group.logical_operator);
                assert_canonical(child, false);
            }
        }
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(group in arb_group()) {
            let once = normalize(group);
            prop_assert_eq!(normalize(once.clone()), once);
        }

        #[test]
        fn normalized_groups_are_canonical(group in arb_group()) {
            assert_canonical(&FilterGroup::new(group).to_primitive(), true);
        }

        #[test]
        fn composition_stays_normalized(
            group in arb_group(),
            ops in prop::collection::vec((any::<bool>(), prop_oneof![Just("a"), Just("b")]), 0..6),
        ) {
            let mut current = FilterGroup::new(group);
            for (and, field) in ops {
                current = if and { current.add_and(f(field)) } else { current.add_or(f(field)) };
                let primitive = current.to_primitive();
                prop_assert_eq!(normalize(primitive.clone()), primitive);
            }
        }
    }
}
