//! Shadowed rule detection
//!
//! A rule is shadowed when some other rule with the same service matches a
//! superset of its sources and a superset of its destinations. Only existence
//! is recorded, not which rule does the shadowing.
//!
//! The pairwise scan is quadratic. Rules are bucketed by service string first
//! since rules with different services can never shadow each other.

use crate::core::address::ResolvedRule;
use crate::core::rulebase::RuleId;
use std::collections::{BTreeSet, HashMap};

/// Service-bucketed view of a resolved rulebase
pub struct ShadowDetector<'a> {
    rules: &'a [ResolvedRule],
    by_service: HashMap<&'a str, Vec<usize>>,
}

impl<'a> ShadowDetector<'a> {
    pub fn new(rules: &'a [ResolvedRule]) -> Self {
        let mut by_service: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            by_service.entry(rule.service.as_str()).or_default().push(idx);
        }
        Self { rules, by_service }
    }

    /// Returns the index of the first other rule that covers rule `idx`.
    pub fn shadowed_by(&self, idx: usize) -> Option<usize> {
        let rule = &self.rules[idx];
        self.by_service
            .get(rule.service.as_str())?
            .iter()
            .copied()
            .filter(|&other| other != idx)
            .find(|&other| rule.is_covered_by(&self.rules[other]))
    }

    pub fn is_shadowed(&self, idx: usize) -> bool {
        self.shadowed_by(idx).is_some()
    }

    /// Ids of every shadowed rule
    pub fn shadowed(&self) -> BTreeSet<RuleId> {
        (0..self.rules.len())
            .filter(|&idx| self.is_shadowed(idx))
            .map(|idx| self.rules[idx].id)
            .collect()
    }
}

/// Ids of every rule covered by another rule of the same service.
pub fn find_shadowed(rules: &[ResolvedRule]) -> BTreeSet<RuleId> {
    ShadowDetector::new(rules).shadowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::resolve;

    fn resolved(id: RuleId, source: &str, destination: &str, service: &str) -> ResolvedRule {
        ResolvedRule {
            id,
            source: resolve(source).unwrap(),
            destination: resolve(destination).unwrap(),
            service: service.to_string(),
        }
    }

    #[test]
    fn test_strict_subset_flags_only_narrower_rule() {
        let rules = vec![
            resolved(1, "IP_10.0.0.0/30", "any", "any"),
            resolved(2, "IP_10.0.0.1", "any", "any"),
        ];
        assert_eq!(find_shadowed(&rules), BTreeSet::from([2]));
    }

    #[test]
    fn test_equal_rules_shadow_each_other() {
        let rules = vec![
            resolved(1, "IP_10.0.0.1", "IP_192.168.0.0/24", "SSH"),
            resolved(2, "IP_10.0.0.1", "IP_192.168.0.0/24", "SSH"),
        ];
        assert_eq!(find_shadowed(&rules), BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_order_does_not_matter() {
        let rules = vec![
            resolved(2, "IP_10.0.0.1", "any", "any"),
            resolved(1, "IP_10.0.0.0/30", "any", "any"),
        ];
        assert_eq!(find_shadowed(&rules), BTreeSet::from([2]));
    }

    #[test]
    fn test_destination_must_also_be_subset() {
        let rules = vec![
            resolved(1, "IP_10.0.0.0/24", "IP_172.16.0.1", "any"),
            resolved(2, "IP_10.0.0.1", "IP_172.16.0.2", "any"),
        ];
        assert!(find_shadowed(&rules).is_empty());
    }

    #[test]
    fn test_different_service_never_shadows() {
        let rules = vec![
            resolved(1, "IP_10.0.0.0/8", "any", "HTTP"),
            resolved(2, "IP_10.0.0.1", "any", "HTTPS"),
        ];
        let detector = ShadowDetector::new(&rules);
        assert_eq!(detector.shadowed_by(1), None);
        assert!(detector.shadowed().is_empty());
    }

    #[test]
    fn test_shadowed_by_reports_first_cover() {
        let rules = vec![
            resolved(1, "IP_10.0.0.5", "any", "any"),
            resolved(2, "IP_10.0.0.0/24", "any", "any"),
            resolved(3, "IP_10.0.0.0/16", "any", "any"),
        ];
        let detector = ShadowDetector::new(&rules);
        assert_eq!(detector.shadowed_by(0), Some(1));
        assert_eq!(detector.shadowed_by(1), Some(2));
        assert_eq!(detector.shadowed_by(2), None);
    }

    #[test]
    fn test_empty_rulebase() {
        assert!(find_shadowed(&[]).is_empty());
    }
}
