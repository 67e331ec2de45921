//! Per-rule anomaly predicates
//!
//! Each category that can be decided from one rule in isolation has a plain
//! function here taking a [`RuleContext`]. [`PredicateSet`] maps categories to
//! predicates and lets callers swap any of them out, which is how the
//! `compliancecheck` and `invalid` policies are meant to be supplied once
//! they are defined.
//!
//! Cross-rule categories (`redundant`, `shadow`) and the externally computed
//! ones (`unused`, `unused_objects`) are not predicates.

use crate::core::coverage::{Interval, any_overlap, covers, total_length};
use crate::core::error::{Error, Result};
use crate::core::result::Category;
use crate::core::rulebase::{
    ComplianceCategory, MANUAL_REVISION, PORT_BREADTH_THRESHOLD, Rule, UNIVERSE_MAX,
    permanent_sentinel,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Compliance reference intervals grouped by registry
///
/// A registry key with no intervals still counts as present.
pub type ComplianceIndex = HashMap<ComplianceCategory, Vec<Interval>>;

/// Everything a predicate may look at for one rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub rule: &'a Rule,
    /// TCP service-port ranges
    pub ports: &'a [Interval],
    /// Source-address ranges
    pub sources: &'a [Interval],
    /// Destination-address ranges
    pub destinations: &'a [Interval],
    pub compliance: &'a ComplianceIndex,
    /// Evaluation instant for temporal checks
    pub now: DateTime<Utc>,
}

impl RuleContext<'_> {
    fn references(&self, category: ComplianceCategory) -> &[Interval] {
        self.compliance.get(&category).map_or(&[], Vec::as_slice)
    }

    fn has_registry(&self, category: ComplianceCategory) -> bool {
        self.compliance.contains_key(&category)
    }
}

pub type Predicate = Box<dyn Fn(&RuleContext<'_>) -> bool + Send + Sync>;

/// Categories decided by a per-rule predicate
pub const PER_RULE_CATEGORIES: [Category; 14] = [
    Category::Expired,
    Category::Permanent,
    Category::DstExcessiveopen,
    Category::PortExcessiveopen,
    Category::Knownportopen,
    Category::Virusportopen,
    Category::Mgmtportopen,
    Category::SrcAnyopen,
    Category::DstAnyopen,
    Category::Noevidence,
    Category::Compliancecheck,
    Category::Disabled,
    Category::Invalid,
    Category::Manual,
];

pub fn expired(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.expire.is_some_and(|expire| expire < ctx.now)
}

pub fn permanent(ctx: &RuleContext<'_>) -> bool {
    ctx.rule
        .expire
        .is_some_and(|expire| expire >= permanent_sentinel())
}

pub fn dst_excessive_open(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.is_any_service()
}

/// Strictly more than [`PORT_BREADTH_THRESHOLD`] ports, counting overlaps twice
pub fn port_excessive_open(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.is_any_service() || total_length(ctx.ports) > PORT_BREADTH_THRESHOLD
}

/// Exposure of a compliance registry's ports.
///
/// An `any` service exposes every registry that has at least one row.
pub fn port_open(ctx: &RuleContext<'_>, category: ComplianceCategory) -> bool {
    if ctx.rule.is_any_service() && ctx.has_registry(category) {
        return true;
    }
    any_overlap(ctx.references(category), ctx.ports)
}

pub fn known_port_open(ctx: &RuleContext<'_>) -> bool {
    port_open(ctx, ComplianceCategory::KnownRisk)
}

pub fn virus_port_open(ctx: &RuleContext<'_>) -> bool {
    port_open(ctx, ComplianceCategory::Virus)
}

pub fn mgmt_port_open(ctx: &RuleContext<'_>) -> bool {
    port_open(ctx, ComplianceCategory::Management)
}

/// Source is `any`, or its ranges leave no gap across the whole universe
pub fn src_any_open(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.is_any_source() || covers(ctx.sources, UNIVERSE_MAX)
}

pub fn dst_any_open(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.is_any_destination() || covers(ctx.destinations, UNIVERSE_MAX)
}

pub fn no_evidence(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.comment.trim().is_empty()
}

/// Not yet specified; never flags.
pub fn compliance_check(_ctx: &RuleContext<'_>) -> bool {
    false
}

pub fn disabled(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.apply_id.as_deref().is_none_or(str::is_empty)
}

/// Not yet specified; never flags.
pub fn invalid(_ctx: &RuleContext<'_>) -> bool {
    false
}

pub fn manual(ctx: &RuleContext<'_>) -> bool {
    ctx.rule.revision == MANUAL_REVISION
}

/// Category → predicate table driving per-rule classification
pub struct PredicateSet {
    predicates: BTreeMap<Category, Predicate>,
}

impl Default for PredicateSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl PredicateSet {
    /// The built-in predicate for every per-rule category
    pub fn standard() -> Self {
        let mut predicates: BTreeMap<Category, Predicate> = BTreeMap::new();
        predicates.insert(Category::Expired, Box::new(expired));
        predicates.insert(Category::Permanent, Box::new(permanent));
        predicates.insert(Category::DstExcessiveopen, Box::new(dst_excessive_open));
        predicates.insert(Category::PortExcessiveopen, Box::new(port_excessive_open));
        predicates.insert(Category::Knownportopen, Box::new(known_port_open));
        predicates.insert(Category::Virusportopen, Box::new(virus_port_open));
        predicates.insert(Category::Mgmtportopen, Box::new(mgmt_port_open));
        predicates.insert(Category::SrcAnyopen, Box::new(src_any_open));
        predicates.insert(Category::DstAnyopen, Box::new(dst_any_open));
        predicates.insert(Category::Noevidence, Box::new(no_evidence));
        predicates.insert(Category::Compliancecheck, Box::new(compliance_check));
        predicates.insert(Category::Disabled, Box::new(disabled));
        predicates.insert(Category::Invalid, Box::new(invalid));
        predicates.insert(Category::Manual, Box::new(manual));
        Self { predicates }
    }

    /// Replaces the predicate for a per-rule category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for categories that are not decided per
    /// rule (`redundant`, `shadow`, `unused`, `unused_objects`).
    pub fn set<F>(&mut self, category: Category, predicate: F) -> Result<()>
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        if !PER_RULE_CATEGORIES.contains(&category) {
            return Err(Error::Validation {
                field: "predicate".to_string(),
                message: format!("'{category}' is not a per-rule category"),
            });
        }
        self.predicates.insert(category, Box::new(predicate));
        Ok(())
    }

    /// Categories whose predicate holds for `ctx`
    pub fn evaluate<'s>(&'s self, ctx: &'s RuleContext<'_>) -> impl Iterator<Item = Category> + 's {
        self.predicates
            .iter()
            .filter(move |(_, predicate)| predicate(ctx))
            .map(|(category, _)| *category)
    }
}
