//! Exact-duplicate rule detection
//!
//! Two rules are redundant when their resolved source set, resolved
//! destination set and service descriptor are identical. Because
//! [`AddressSet`] is canonical, differently spelled descriptors with the same
//! members (`IP_10.0.0.0/30` and `IP_10.0.0.0-10.0.0.3`) collide.

use crate::core::address::{AddressSet, ResolvedRule};
use crate::core::rulebase::RuleId;
use std::collections::{BTreeSet, HashMap};

/// Structural identity of a rule's match criteria
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub source: AddressSet,
    pub destination: AddressSet,
    pub service: String,
}

impl From<&ResolvedRule> for CanonicalKey {
    fn from(rule: &ResolvedRule) -> Self {
        Self {
            source: rule.source.clone(),
            destination: rule.destination.clone(),
            service: rule.service.clone(),
        }
    }
}

/// Tracks the first rule seen for each canonical key
///
/// Rules must be fed in input order; the earliest rule owns a key.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashMap<CanonicalKey, RuleId>,
    redundant: BTreeSet<RuleId>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a rule. On a repeated key both the first owner and `rule` are
    /// marked redundant. Returns the first owner's id in that case.
    pub fn observe(&mut self, rule: &ResolvedRule) -> Option<RuleId> {
        let key = CanonicalKey::from(rule);
        match self.seen.get(&key) {
            Some(&first) => {
                self.redundant.insert(first);
                self.redundant.insert(rule.id);
                Some(first)
            }
            None => {
                self.seen.insert(key, rule.id);
                None
            }
        }
    }

    pub fn into_redundant(self) -> BTreeSet<RuleId> {
        self.redundant
    }
}

/// Ids of every rule sharing its canonical key with another rule.
pub fn find_redundant(rules: &[ResolvedRule]) -> BTreeSet<RuleId> {
    let mut dedup = Deduplicator::new();
    for rule in rules {
        dedup.observe(rule);
    }
    dedup.into_redundant()
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
    fn test_identical_rules_are_both_flagged() {
        let rules = vec![
            resolved(1, "IP_10.0.0.1", "any", "HTTPS"),
            resolved(2, "IP_10.0.0.1", "any", "HTTPS"),
            resolved(3, "IP_10.0.0.2", "any", "HTTPS"),
        ];
        assert_eq!(find_redundant(&rules), BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_spelling_does_not_matter() {
        let rules = vec![
            resolved(1, "IP_10.0.0.0/30", "any", "any"),
            resolved(2, "IP_10.0.0.0-10.0.0.3", "any", "any"),
            resolved(3, "IP_10.0.0.3,IP_10.0.0.2,IP_10.0.0.1,IP_10.0.0.0", "any", "any"),
        ];
        assert_eq!(find_redundant(&rules), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_service_is_part_of_key() {
        let rules = vec![
            resolved(1, "any", "any", "HTTP"),
            resolved(2, "any", "any", "HTTPS"),
        ];
        assert!(find_redundant(&rules).is_empty());
    }

    #[test]
    fn test_first_seen_owns_the_key() {
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.observe(&resolved(5, "any", "any", "any")), None);
        assert_eq!(dedup.observe(&resolved(3, "any", "any", "any")), Some(5));
        assert_eq!(dedup.observe(&resolved(9, "any", "any", "any")), Some(5));
        assert_eq!(dedup.into_redundant(), BTreeSet::from([3, 5, 9]));
    }

    #[test]
    fn test_symbolic_token_differs_from_addresses() {
        let rules = vec![
            resolved(1, "any", "any", "any"),
            resolved(2, "IP_0.0.0.0/0", "any", "any"),
        ];
        assert!(find_redundant(&rules).is_empty());
    }
}
