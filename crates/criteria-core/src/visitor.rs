//! Double-dispatch contract between criteria trees and their targets.
//!
//! Nodes decide which method runs ([`Criteria::accept`], [`JoinEntry::accept`],
//! [`FilterGroup::accept`], [`Filter::accept`]); the visitor decides what
//! each node becomes. One tree can therefore be translated into any number
//! of target representations without touching the tree types.
//!
//! A visitor must:
//! - merge a joined criteria's own filters into that join's condition
//! - recurse into the joined criteria's nested joins
//! - expand select-all from the schema at translation time
//! - emit orders root first, then each join's in registration order
//! - emit nothing for an empty filter group
//! - emit no limit when `take == 0`, whatever `skip` is
//! - reset its per-call state in `visit_root`
//!
//! [`JoinEntry::accept`]: crate::join::JoinEntry::accept

use crate::criteria::Criteria;
use crate::error::CriteriaError;
use crate::filter::Filter;
use crate::group::FilterGroup;
use crate::join::ResolvedJoin;

pub trait CriteriaVisitor {
    /// Threaded through criteria-level visits
    type Context;
    /// Result of criteria-level visits
    type Output;
    /// Result of filter-level visits
    type FilterOutput;
    type Error: From<CriteriaError>;

    fn visit_root(
        &mut self,
        criteria: &Criteria,
        context: Self::Context,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_inner_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        context: Self::Context,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_left_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        context: Self::Context,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_outer_join(
        &mut self,
        criteria: &Criteria,
        parameters: &ResolvedJoin,
        context: Self::Context,
    ) -> Result<Self::Output, Self::Error>;

    /// `alias` is the alias of the criteria owning the filter
    fn visit_filter(&mut self, filter: &Filter, alias: &str)
        -> Result<Self::FilterOutput, Self::Error>;

    fn visit_and_group(
        &mut self,
        group: &FilterGroup,
        alias: &str,
    ) -> Result<Self::FilterOutput, Self::Error>;

    fn visit_or_group(
        &mut self,
        group: &FilterGroup,
        alias: &str,
    ) -> Result<Self::FilterOutput, Self::Error>;
}

/// Entry point for translating a root criteria.
///
/// Implemented for every [`CriteriaVisitor`].
pub trait CriteriaTranslator: CriteriaVisitor {
    fn translate(
        &mut self,
        criteria: &Criteria,
        context: Self::Context,
    ) -> Result<Self::Output, Self::Error> {
        criteria.accept(self, context)
    }
}

impl<V: CriteriaVisitor + ?Sized> CriteriaTranslator for V {}
