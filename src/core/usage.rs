//! Traffic-log correlation for the `unused` verdict
//!
//! The classifier only merges a precomputed set of unused rule ids. This
//! module computes that set the way the log store does: a rule is unused when
//! no traffic-log entry names it as its matching policy.

use crate::core::rulebase::{Rule, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// One traffic-log line, reduced to the fields correlation looks at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrafficLogEntry {
    /// Policy id as written by the firewall, textual
    #[serde(alias = "policyid")]
    pub policy_id: String,
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "srcip")]
    pub src_ip: Option<u32>,
    #[serde(default, alias = "dstip")]
    pub dst_ip: Option<u32>,
    #[serde(default, alias = "dstport")]
    pub dst_port: Option<u16>,
    #[serde(default)]
    pub service: Option<String>,
}

/// Ids of rules no log entry refers to.
///
/// The join is textual: a rule matches a log entry when the rule id's decimal
/// form equals the entry's policy id exactly.
pub fn unused_rules<'a>(
    rules: &[Rule],
    logs: impl IntoIterator<Item = &'a TrafficLogEntry>,
) -> BTreeSet<RuleId> {
    let seen: HashSet<&str> = logs.into_iter().map(|e| e.policy_id.as_str()).collect();
    rules
        .iter()
        .filter(|rule| !seen.contains(rule.id.to_string().as_str()))
        .map(|rule| rule.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rulebase::Action;

    fn rule(id: RuleId) -> Rule {
        Rule {
            id,
            source: "any".to_string(),
            destination: "any".to_string(),
            service: "any".to_string(),
            comment: String::new(),
            expire: None,
            apply_id: None,
            revision: 0,
            action: Action::Allow,
            from_zone: None,
            to_zone: None,
        }
    }

    fn log(policy_id: &str) -> TrafficLogEntry {
        TrafficLogEntry {
            policy_id: policy_id.to_string(),
            event_time: None,
            src_ip: None,
            dst_ip: None,
            dst_port: None,
            service: None,
        }
    }

    #[test]
    fn test_rules_without_logs_are_unused() {
        let rules = vec![rule(1), rule(2), rule(3)];
        let logs = vec![log("1"), log("3"), log("3")];
        assert_eq!(unused_rules(&rules, &logs), BTreeSet::from([2]));
    }

    #[test]
    fn test_join_is_exact_text() {
        let rules = vec![rule(7)];
        let logs = vec![log("07"), log(" 7")];
        assert_eq!(unused_rules(&rules, &logs), BTreeSet::from([7]));
    }

    #[test]
    fn test_no_logs_means_all_unused() {
        let rules = vec![rule(1), rule(2)];
        assert_eq!(unused_rules(&rules, &[]), BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_store_column_names_deserialize() {
        let json = r#"{"policyid": "12", "srcip": 167772161, "dstport": 443}"#;
        let entry: TrafficLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.policy_id, "12");
        assert_eq!(entry.src_ip, Some(167_772_161));
        assert_eq!(entry.dst_port, Some(443));
    }
}
