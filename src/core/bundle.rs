//! JSON rulebase bundles
//!
//! A bundle is the on-disk export of one firewall: its identity, rules,
//! decomposed ranges, compliance registry and the externally computed verdicts.
//! Column names of the rule store are accepted as aliases so raw exports load
//! unchanged.
//!
//! ```json
//! {
//!   "firewall": { "id": 1, "name": "edge-1" },
//!   "rules": [ { "id": 10, "source": "any", "destination": "IP_10.0.0.1", "service": "HTTPS" } ],
//!   "ranges": [ { "rulebase_id": 10, "ctype": 0, "start_object": 443, "end_object": 443 } ],
//!   "compliance": [ { "type": "mn", "start": 22, "end": 22 } ],
//!   "unused": [],
//!   "unused_objects": []
//! }
//! ```
//!
//! When a `logs` array is present, the `unused` set is derived from it
//! instead of being read from the bundle.

use crate::core::classifier::AnalysisInput;
use crate::core::error::{Error, Result};
use crate::core::rulebase::{
    ComplianceCategory, ComplianceReference, DecomposedRange, Firewall, RangeDimension, Rule,
    RuleId,
};
use crate::core::usage::{TrafficLogEntry, unused_rules};
use crate::validators::{validate_ctype, validate_firewall_name, validate_universe_range};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// One decomposed range as exported, dimension given by name or store code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeRecord {
    #[serde(alias = "rulebase_id")]
    pub rule_id: RuleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<RangeDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctype: Option<u8>,
    #[serde(alias = "start_object")]
    pub start: u64,
    #[serde(alias = "end_object")]
    pub end: u64,
}

impl RangeRecord {
    fn decompose(&self) -> Result<DecomposedRange> {
        let dimension = match (self.dimension, self.ctype) {
            (Some(dimension), _) => dimension,
            (None, Some(ctype)) => validate_ctype(ctype).map_err(|message| Error::Validation {
                field: format!("ranges[rule {}].ctype", self.rule_id),
                message,
            })?,
            (None, None) => {
                return Err(Error::Validation {
                    field: format!("ranges[rule {}]", self.rule_id),
                    message: "Range has neither a dimension nor a ctype".to_string(),
                });
            }
        };
        Ok(DecomposedRange {
            rule_id: self.rule_id,
            dimension,
            start: self.start,
            end: self.end,
        })
    }
}

/// One compliance registry row as exported; the tag is free text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceRecord {
    #[serde(alias = "type")]
    pub category: String,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ComplianceRecord {
    /// The bounded interval of this row, `None` when a bound is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an inverted or out-of-universe interval
    fn reference(
        &self,
        category: ComplianceCategory,
        index: usize,
    ) -> Result<Option<ComplianceReference>> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Ok(None);
        };
        let (start, end) =
            validate_universe_range(start, end).map_err(|message| Error::Validation {
                field: format!("compliance[{index}]"),
                message,
            })?;
        Ok(Some(ComplianceReference {
            category,
            start,
            end,
            name: self.name.clone(),
        }))
    }
}

/// Everything needed to analyze one firewall
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RulebaseBundle {
    pub firewall: Firewall,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub ranges: Vec<RangeRecord>,
    #[serde(default)]
    pub compliance: Vec<ComplianceRecord>,
    #[serde(default)]
    pub unused: BTreeSet<RuleId>,
    #[serde(default)]
    pub unused_objects: BTreeSet<RuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<TrafficLogEntry>>,
}

impl RulebaseBundle {
    /// Parses and validates a bundle.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] for malformed JSON or mistyped fields
    /// - [`Error::Validation`] for an unusable firewall name
    pub fn from_json(json: &str) -> Result<Self> {
        let mut bundle: Self = serde_json::from_str(json)?;
        bundle.firewall.name =
            validate_firewall_name(&bundle.firewall.name).map_err(|message| Error::Validation {
                field: "firewall.name".to_string(),
                message,
            })?;
        debug!(
            "Parsed bundle for firewall {} ({}): {} rules, {} ranges, {} compliance rows",
            bundle.firewall.name,
            bundle.firewall.id,
            bundle.rules.len(),
            bundle.ranges.len(),
            bundle.compliance.len()
        );
        Ok(bundle)
    }

    /// Builds the classifier input.
    ///
    /// Compliance rows with unknown tags are dropped. Rows of a known registry
    /// without both bounds contribute no interval but still mark the registry
    /// as present.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an unknown `ctype`, a range without a
    /// dimension, or a malformed compliance interval
    pub fn analysis_input(&self) -> Result<AnalysisInput> {
        let ranges = self
            .ranges
            .iter()
            .map(RangeRecord::decompose)
            .collect::<Result<Vec<_>>>()?;

        let mut compliance = Vec::with_capacity(self.compliance.len());
        let mut registries = BTreeSet::new();
        let mut unknown = 0usize;
        for (index, record) in self.compliance.iter().enumerate() {
            let Some(category) = ComplianceCategory::from_tag(&record.category) else {
                unknown += 1;
                continue;
            };
            registries.insert(category);
            match record.reference(category, index)? {
                Some(reference) => compliance.push(reference),
                None => debug!("Compliance row {index} ({category}) has no bounds"),
            }
        }
        if unknown > 0 {
            debug!("Skipped {unknown} compliance row(s) outside the known registries");
        }

        let unused = match &self.logs {
            Some(logs) => {
                if !self.unused.is_empty() {
                    warn!(
                        "Bundle for firewall {} has both logs and an unused set; deriving from logs",
                        self.firewall.id
                    );
                }
                unused_rules(&self.rules, logs)
            }
            None => self.unused.clone(),
        };

        Ok(AnalysisInput {
            rules: self.rules.clone(),
            ranges,
            compliance,
            registries,
            unused,
            unused_objects: self.unused_objects.clone(),
        })
    }
}

/// Reads and parses a bundle file.
pub async fn load_bundle(path: &Path) -> Result<RulebaseBundle> {
    let json = tokio::fs::read_to_string(path).await?;
    RulebaseBundle::from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_EXPORT: &str = r#"{
        "firewall": { "id": 4, "name": " edge-4 " },
        "rules": [
            { "id": 1, "source": "any", "destination": "IP_10.0.0.1", "service": "SSH", "apply_id": "g" },
            { "id": 2, "source": "any", "destination": "any", "service": "any", "apply_id": "g" }
        ],
        "ranges": [
            { "rulebase_id": 1, "ctype": 0, "start_object": 22, "end_object": 22 },
            { "rule_id": 2, "dimension": "source_address", "start": 0, "end": 4294836225 }
        ],
        "compliance": [
            { "type": "mn", "start": 22, "end": 22, "name": "ssh" },
            { "type": "zz", "start": 1, "end": 1 },
            { "type": "wn", "start": null, "end": 5 }
        ],
        "unused": [2]
    }"#;

    #[test]
    fn test_store_export_parses() {
        let bundle = RulebaseBundle::from_json(STORE_EXPORT).unwrap();
        assert_eq!(bundle.firewall.name, "edge-4");
        assert_eq!(bundle.rules.len(), 2);
        assert!(bundle.unused_objects.is_empty());
        assert!(bundle.logs.is_none());
    }

    #[test]
    fn test_analysis_input_maps_ranges_and_filters_compliance() {
        let input = RulebaseBundle::from_json(STORE_EXPORT)
            .unwrap()
            .analysis_input()
            .unwrap();

        assert_eq!(input.ranges[0].dimension, RangeDimension::ServicePortTcp);
        assert_eq!(input.ranges[1].dimension, RangeDimension::SourceAddress);
        assert_eq!(input.compliance.len(), 1);
        assert_eq!(input.compliance[0].category, ComplianceCategory::Management);
        assert_eq!(
            input.registries,
            BTreeSet::from([ComplianceCategory::KnownRisk, ComplianceCategory::Management])
        );
        assert_eq!(input.unused, BTreeSet::from([2]));
    }

    #[test]
    fn test_inverted_compliance_interval_is_rejected() {
        let json = STORE_EXPORT.replace(
            r#"{ "type": "mn", "start": 22, "end": 22, "name": "ssh" }"#,
            r#"{ "type": "mn", "start": 30, "end": 10 }"#,
        );
        let err = RulebaseBundle::from_json(&json)
            .unwrap()
            .analysis_input()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "compliance[0]"));
    }

    #[test]
    fn test_out_of_universe_compliance_interval_is_rejected() {
        let json = STORE_EXPORT.replace(
            r#""start": 22, "end": 22, "name""#,
            r#""start": 22, "end": 4294836226, "name""#,
        );
        let err = RulebaseBundle::from_json(&json)
            .unwrap()
            .analysis_input()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_unknown_tag_with_bad_interval_is_still_skipped() {
        let json = STORE_EXPORT.replace(
            r#"{ "type": "zz", "start": 1, "end": 1 }"#,
            r#"{ "type": "zz", "start": 9, "end": 1 }"#,
        );
        let input = RulebaseBundle::from_json(&json)
            .unwrap()
            .analysis_input()
            .unwrap();
        assert_eq!(input.compliance.len(), 1);
    }

    #[test]
    fn test_unbounded_row_exposes_registry_to_any_service() {
        let input = RulebaseBundle::from_json(STORE_EXPORT)
            .unwrap()
            .analysis_input()
            .unwrap();
        let result = crate::core::classifier::RuleClassifier::new()
            .analyze(&input, chrono::Utc::now())
            .unwrap();

        // rule 2 is `any`; the `wn` registry only has a row without bounds
        assert!(result.contains(crate::core::result::Category::Knownportopen, 2));
        assert!(!result.contains(crate::core::result::Category::Knownportopen, 1));
    }

    #[test]
    fn test_store_shaped_rule_columns_load() {
        let json = STORE_EXPORT.replace(
            r#""service": "SSH", "apply_id": "g""#,
            r#""service": "SSH", "apply_id": "g", "comment": null, "expire": "2020-01-01T00:00:00""#,
        );
        let bundle = RulebaseBundle::from_json(&json).unwrap();
        assert!(bundle.rules[0].comment.is_empty());
        assert!(bundle.rules[0].expire.is_some());
    }

    #[test]
    fn test_logs_replace_unused_set() {
        let mut bundle = RulebaseBundle::from_json(STORE_EXPORT).unwrap();
        bundle.logs = Some(vec![
            serde_json::from_str(r#"{"policyid": "2"}"#).unwrap(),
        ]);
        let input = bundle.analysis_input().unwrap();
        assert_eq!(input.unused, BTreeSet::from([1]));
    }

    #[test]
    fn test_unknown_ctype_is_rejected() {
        let json = STORE_EXPORT.replace(r#""ctype": 0"#, r#""ctype": 9"#);
        let err = RulebaseBundle::from_json(&json)
            .unwrap()
            .analysis_input()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_range_without_dimension_is_rejected() {
        let json = STORE_EXPORT.replace(r#""ctype": 0, "#, "");
        let err = RulebaseBundle::from_json(&json)
            .unwrap()
            .analysis_input()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_blank_firewall_name_is_rejected() {
        let json = STORE_EXPORT.replace(" edge-4 ", "  ");
        assert!(matches!(
            RulebaseBundle::from_json(&json),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_mistyped_rule_id_is_serialization_error() {
        let json = STORE_EXPORT.replace(r#""id": 1,"#, r#""id": "one","#);
        assert!(matches!(
            RulebaseBundle::from_json(&json),
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_load_bundle_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("edge.json");
        tokio::fs::write(&path, STORE_EXPORT).await.unwrap();
        let bundle = load_bundle(&path).await.unwrap();
        assert_eq!(bundle.firewall.id, 4);

        assert!(matches!(
            load_bundle(&tmp.path().join("missing.json")).await,
            Err(Error::Io(_))
        ));
    }
}
