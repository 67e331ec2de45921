//! Rulebase classification
//!
//! [`RuleClassifier::analyze`] takes one firewall's rules, decomposed ranges,
//! compliance references and externally computed usage verdicts and returns a
//! [`ClassificationResult`] with every category filled in.
//!
//! The pass is pure and all-or-nothing: a malformed descriptor or range
//! aborts the whole analysis and no partial result is produced.
//!
//! # Example
//!
//! ```
//! use fwaudit::core::classifier::{AnalysisInput, RuleClassifier};
//! use fwaudit::core::result::Category;
//! use fwaudit::core::rulebase::{Action, Rule};
//!
//! let rule = |id, source: &str| Rule {
//!     id,
//!     source: source.to_string(),
//!     destination: "any".to_string(),
//!     service: "any".to_string(),
//!     comment: "approved".to_string(),
//!     expire: None,
//!     apply_id: Some("a1".to_string()),
//!     revision: 0,
//!     action: Action::Allow,
//!     from_zone: None,
//!     to_zone: None,
//! };
//!
//! let input = AnalysisInput {
//!     rules: vec![rule(1, "IP_10.0.0.0/30"), rule(2, "IP_10.0.0.1")],
//!     ..AnalysisInput::default()
//! };
//! let result = RuleClassifier::new().analyze(&input, chrono::Utc::now()).unwrap();
//! assert!(result.contains(Category::Shadow, 2));
//! assert!(!result.contains(Category::Shadow, 1));
//! ```

use crate::core::address::ResolvedRule;
use crate::core::coverage::Interval;
use crate::core::dedup::find_redundant;
use crate::core::error::{Error, Result};
use crate::core::predicates::{ComplianceIndex, PredicateSet, RuleContext};
use crate::core::result::{Category, ClassificationResult};
use crate::core::rulebase::{
    ComplianceCategory, ComplianceReference, DecomposedRange, RangeDimension, Rule, RuleId,
};
use crate::core::shadow::find_shadowed;
use crate::validators::validate_universe_range;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Materialized inputs for one firewall
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub ranges: Vec<DecomposedRange>,
    #[serde(default)]
    pub compliance: Vec<ComplianceReference>,
    /// Registries with at least one row, bounded or not
    #[serde(default)]
    pub registries: BTreeSet<ComplianceCategory>,
    /// Rules with no correlated traffic-log entry
    #[serde(default)]
    pub unused: BTreeSet<RuleId>,
    /// Rules whose decomposed objects saw no traffic
    #[serde(default)]
    pub unused_objects: BTreeSet<RuleId>,
}

/// One rule's decomposed ranges, split by what they constrain
#[derive(Debug, Default)]
struct RuleRanges {
    ports: Vec<Interval>,
    sources: Vec<Interval>,
    destinations: Vec<Interval>,
}

/// Orchestrates per-rule predicates, deduplication and shadow detection
#[derive(Default)]
pub struct RuleClassifier {
    predicates: PredicateSet,
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicates_mut(&mut self) -> &mut PredicateSet {
        &mut self.predicates
    }

    /// Classifies every rule in `input` as of `now`.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateRule`] if two rules share an id
    /// - [`Error::InvalidRange`] for an inverted or out-of-universe range
    /// - [`Error::Descriptor`] for an unparseable address descriptor
    pub fn analyze(&self, input: &AnalysisInput, now: DateTime<Utc>) -> Result<ClassificationResult> {
        let started = std::time::Instant::now();

        let known_ids = rule_ids(&input.rules)?;
        let ranges = group_ranges(&input.ranges, &known_ids)?;
        let compliance = index_compliance(&input.compliance, &input.registries);
        let resolved = input
            .rules
            .iter()
            .map(ResolvedRule::from_rule)
            .collect::<Result<Vec<_>>>()?;

        let mut result = ClassificationResult::new();
        let no_ranges = RuleRanges::default();

        for rule in &input.rules {
            let own = ranges.get(&rule.id).unwrap_or(&no_ranges);
            let ctx = RuleContext {
                rule,
                ports: &own.ports,
                sources: &own.sources,
                destinations: &own.destinations,
                compliance: &compliance,
                now,
            };
            for category in self.predicates.evaluate(&ctx) {
                result.insert(category, rule.id);
            }
        }

        result.extend(Category::Redundant, find_redundant(&resolved));
        result.extend(Category::Shadow, find_shadowed(&resolved));

        merge_verdicts(&mut result, Category::Unused, &input.unused, &known_ids);
        merge_verdicts(
            &mut result,
            Category::UnusedObjects,
            &input.unused_objects,
            &known_ids,
        );

        for (category, count) in result.counts() {
            if count > 0 {
                debug!("{category}: {count} rule(s)");
            }
        }
        info!(
            "Classified {} rules ({} ranges, {} compliance refs) in {:?}",
            input.rules.len(),
            input.ranges.len(),
            input.compliance.len(),
            started.elapsed()
        );

        Ok(result)
    }
}

/// Classifies `input` with the standard predicates as of the current time.
///
/// # Errors
///
/// See [`RuleClassifier::analyze`].
pub fn analyze(input: &AnalysisInput) -> Result<ClassificationResult> {
    RuleClassifier::new().analyze(input, Utc::now())
}

fn rule_ids(rules: &[Rule]) -> Result<HashSet<RuleId>> {
    let mut ids = HashSet::with_capacity(rules.len());
    for rule in rules {
        if !ids.insert(rule.id) {
            return Err(Error::DuplicateRule(rule.id));
        }
    }
    Ok(ids)
}

fn group_ranges(
    ranges: &[DecomposedRange],
    known_ids: &HashSet<RuleId>,
) -> Result<HashMap<RuleId, RuleRanges>> {
    let mut grouped: HashMap<RuleId, RuleRanges> = HashMap::new();
    let mut orphans = 0usize;
    let mut udp = 0usize;

    for range in ranges {
        if validate_universe_range(range.start, range.end).is_err() {
            return Err(Error::InvalidRange {
                rule_id: range.rule_id,
                start: range.start,
                end: range.end,
            });
        }
        if !known_ids.contains(&range.rule_id) {
            orphans += 1;
            continue;
        }

        let entry = grouped.entry(range.rule_id).or_default();
        let interval = Interval::new(range.start, range.end);
        match range.dimension {
            RangeDimension::ServicePortTcp => entry.ports.push(interval),
            RangeDimension::ServicePortUdp => udp += 1,
            RangeDimension::SourceAddress => entry.sources.push(interval),
            RangeDimension::DestinationAddress => entry.destinations.push(interval),
        }
    }

    if orphans > 0 {
        debug!("Ignored {orphans} decomposed range(s) of rules outside this rulebase");
    }
    if udp > 0 {
        debug!("{udp} UDP range(s) kept out of the port checks");
    }
    Ok(grouped)
}

fn index_compliance(
    references: &[ComplianceReference],
    registries: &BTreeSet<ComplianceCategory>,
) -> ComplianceIndex {
    let mut index: ComplianceIndex = registries
        .iter()
        .map(|category| (*category, Vec::new()))
        .collect();
    for reference in references {
        index
            .entry(reference.category)
            .or_default()
            .push(Interval::new(reference.start, reference.end));
    }
    index
}

fn merge_verdicts(
    result: &mut ClassificationResult,
    category: Category,
    ids: &BTreeSet<RuleId>,
    known_ids: &HashSet<RuleId>,
) {
    let (known, stray): (Vec<RuleId>, Vec<RuleId>) =
        ids.iter().copied().partition(|id| known_ids.contains(id));
    if !stray.is_empty() {
        warn!(
            "Dropping {} {category} verdict(s) for rules outside this rulebase: {:?}",
            stray.len(),
            stray
        );
    }
    result.extend(category, known);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Direction;
    use crate::core::rulebase::{Action, UNIVERSE_MAX};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 8, 30, 0).unwrap()
    }

    fn rule(id: RuleId, source: &str, destination: &str, service: &str) -> Rule {
        Rule {
            id,
            source: source.to_string(),
            destination: destination.to_string(),
            service: service.to_string(),
            comment: "reviewed".to_string(),
            expire: None,
            apply_id: Some("apply".to_string()),
            revision: 0,
            action: Action::Allow,
            from_zone: None,
            to_zone: None,
        }
    }

    fn range(rule_id: RuleId, dimension: RangeDimension, start: u64, end: u64) -> DecomposedRange {
        DecomposedRange {
            rule_id,
            dimension,
            start,
            end,
        }
    }

    fn classify(input: &AnalysisInput) -> ClassificationResult {
        RuleClassifier::new().analyze(input, now()).unwrap()
    }

    #[test]
    fn test_empty_rulebase_yields_empty_sets() {
        let result = classify(&AnalysisInput::default());
        assert_eq!(result.iter().count(), Category::COUNT);
        assert!(result.flagged_rules().is_empty());
    }

    #[test]
    fn test_two_rule_scenario() {
        let input = AnalysisInput {
            rules: vec![
                rule(1, "IP_10.0.0.0/30", "any", "any"),
                rule(2, "IP_10.0.0.1", "any", "any"),
            ],
            ..AnalysisInput::default()
        };
        let result = classify(&input);

        assert_eq!(result.get(Category::Shadow), &BTreeSet::from([2]));
        assert_eq!(result.get(Category::DstExcessiveopen), &BTreeSet::from([1, 2]));
        assert!(!result.contains(Category::SrcAnyopen, 1));
        assert!(result.contains(Category::DstAnyopen, 1));
        assert!(result.get(Category::Redundant).is_empty());
    }

    #[test]
    fn test_ranges_drive_coverage_and_breadth() {
        let input = AnalysisInput {
            rules: vec![
                rule(1, "IP_0.0.0.0/1", "IP_10.0.0.1", "WIDE"),
                rule(2, "IP_0.0.0.0/1", "IP_10.0.0.2", "NARROW"),
            ],
            ranges: vec![
                range(1, RangeDimension::SourceAddress, 0, 100),
                range(1, RangeDimension::SourceAddress, 101, UNIVERSE_MAX),
                range(1, RangeDimension::ServicePortTcp, 1, 80),
                range(1, RangeDimension::ServicePortTcp, 100, 122),
                range(2, RangeDimension::SourceAddress, 0, 100),
                range(2, RangeDimension::SourceAddress, 200, UNIVERSE_MAX),
                range(2, RangeDimension::ServicePortTcp, 443, 443),
            ],
            ..AnalysisInput::default()
        };
        let result = classify(&input);

        assert_eq!(result.get(Category::SrcAnyopen), &BTreeSet::from([1]));
        assert_eq!(result.get(Category::PortExcessiveopen), &BTreeSet::from([1]));
    }

    #[test]
    fn test_udp_ranges_stay_out_of_port_checks() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "DNS-GRP")],
            ranges: vec![
                range(1, RangeDimension::ServicePortTcp, 1000, 1060),
                range(1, RangeDimension::ServicePortUdp, 2000, 2060),
            ],
            compliance: vec![ComplianceReference {
                category: ComplianceCategory::KnownRisk,
                start: 2030,
                end: 2030,
                name: None,
            }],
            ..AnalysisInput::default()
        };
        let result = classify(&input);

        assert!(result.get(Category::PortExcessiveopen).is_empty());
        assert!(result.get(Category::Knownportopen).is_empty());
    }

    #[test]
    fn test_compliance_categories_are_independent() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "SSH"), rule(2, "any", "any", "any")],
            ranges: vec![range(1, RangeDimension::ServicePortTcp, 22, 22)],
            compliance: vec![
                ComplianceReference {
                    category: ComplianceCategory::Management,
                    start: 22,
                    end: 23,
                    name: Some("ssh/telnet".to_string()),
                },
                ComplianceReference {
                    category: ComplianceCategory::Virus,
                    start: 31337,
                    end: 31337,
                    name: None,
                },
            ],
            ..AnalysisInput::default()
        };
        let result = classify(&input);

        assert_eq!(result.get(Category::Mgmtportopen), &BTreeSet::from([1, 2]));
        assert_eq!(result.get(Category::Virusportopen), &BTreeSet::from([2]));
        assert!(result.get(Category::Knownportopen).is_empty());
    }

    #[test]
    fn test_temporal_and_administrative_flags() {
        let mut expired = rule(1, "any", "any", "HTTP");
        expired.expire = Some(now() - Duration::seconds(1));
        let mut forever = rule(2, "any", "any", "HTTPS");
        forever.expire = Some(Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap());
        forever.comment = String::new();
        forever.apply_id = None;
        forever.revision = -1;

        let input = AnalysisInput {
            rules: vec![expired, forever],
            ..AnalysisInput::default()
        };
        let result = classify(&input);

        assert_eq!(result.get(Category::Expired), &BTreeSet::from([1]));
        assert_eq!(result.get(Category::Permanent), &BTreeSet::from([2]));
        assert_eq!(result.get(Category::Noevidence), &BTreeSet::from([2]));
        assert_eq!(result.get(Category::Disabled), &BTreeSet::from([2]));
        assert_eq!(result.get(Category::Manual), &BTreeSet::from([2]));
        assert!(result.get(Category::Compliancecheck).is_empty());
        assert!(result.get(Category::Invalid).is_empty());
    }

    #[test]
    fn test_duplicates_are_redundant_and_mutually_shadowed() {
        let input = AnalysisInput {
            rules: vec![
                rule(10, "IP_10.1.0.0/16", "IP_8.8.8.8", "DNS"),
                rule(11, "IP_10.1.0.0-10.1.255.255", "IP_8.8.8.8", "DNS"),
            ],
            ..AnalysisInput::default()
        };
        let result = classify(&input);
        assert_eq!(result.get(Category::Redundant), &BTreeSet::from([10, 11]));
        assert_eq!(result.get(Category::Shadow), &BTreeSet::from([10, 11]));
    }

    #[test]
    fn test_external_verdicts_are_filtered_to_rulebase() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "HTTP"), rule(2, "any", "any", "SSH")],
            unused: BTreeSet::from([2, 99]),
            unused_objects: BTreeSet::from([1]),
            ..AnalysisInput::default()
        };
        let result = classify(&input);
        assert_eq!(result.get(Category::Unused), &BTreeSet::from([2]));
        assert_eq!(result.get(Category::UnusedObjects), &BTreeSet::from([1]));
    }

    #[test]
    fn test_malformed_descriptor_aborts() {
        let input = AnalysisInput {
            rules: vec![
                rule(1, "any", "any", "HTTP"),
                rule(2, "IP_10.0.0.0/99", "any", "HTTP"),
            ],
            ..AnalysisInput::default()
        };
        let err = RuleClassifier::new().analyze(&input, now()).unwrap_err();
        assert!(matches!(
            err,
            Error::Descriptor {
                rule_id: 2,
                direction: Direction::Source,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_universe_range_aborts() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "HTTP")],
            ranges: vec![range(1, RangeDimension::DestinationAddress, 0, UNIVERSE_MAX + 1)],
            ..AnalysisInput::default()
        };
        let err = RuleClassifier::new().analyze(&input, now()).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { rule_id: 1, .. }));
    }

    #[test]
    fn test_inverted_range_aborts() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "HTTP")],
            ranges: vec![range(1, RangeDimension::ServicePortTcp, 90, 80)],
            ..AnalysisInput::default()
        };
        assert!(RuleClassifier::new().analyze(&input, now()).is_err());
    }

    #[test]
    fn test_duplicate_rule_id_aborts() {
        let input = AnalysisInput {
            rules: vec![rule(4, "any", "any", "HTTP"), rule(4, "any", "any", "SSH")],
            ..AnalysisInput::default()
        };
        let err = RuleClassifier::new().analyze(&input, now()).unwrap_err();
        assert!(matches!(err, Error::DuplicateRule(4)));
    }

    #[test]
    fn test_ranges_of_other_rules_are_ignored() {
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "HTTP")],
            ranges: vec![range(77, RangeDimension::ServicePortTcp, 0, 65535)],
            ..AnalysisInput::default()
        };
        let result = classify(&input);
        assert!(result.get(Category::PortExcessiveopen).is_empty());
    }

    #[test]
    fn test_every_flagged_id_belongs_to_rulebase() {
        let input = AnalysisInput {
            rules: vec![
                rule(1, "any", "any", "any"),
                rule(2, "any", "any", "any"),
                rule(3, "IP_10.0.0.1", "any", "SSH"),
            ],
            unused: BTreeSet::from([3, 4, 5]),
            ..AnalysisInput::default()
        };
        let result = classify(&input);
        assert!(result.flagged_rules().is_subset(&BTreeSet::from([1, 2, 3])));
    }

    #[test]
    fn test_custom_predicate_is_used() {
        let mut classifier = RuleClassifier::new();
        classifier
            .predicates_mut()
            .set(Category::Compliancecheck, |ctx| ctx.rule.action == Action::Deny)
            .unwrap();

        let mut deny = rule(2, "any", "any", "HTTP");
        deny.action = Action::Deny;
        let input = AnalysisInput {
            rules: vec![rule(1, "any", "any", "HTTP"), deny],
            ..AnalysisInput::default()
        };
        let result = classifier.analyze(&input, now()).unwrap();
        assert_eq!(result.get(Category::Compliancecheck), &BTreeSet::from([2]));
    }
}
