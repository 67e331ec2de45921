//! Classification categories and the per-firewall result bundle

use crate::core::rulebase::RuleId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::IntoEnumIterator;

/// Anomaly category a rule can be flagged with
///
/// The set is fixed; declaration order is the order reports list them in.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Expired,
    Permanent,
    Redundant,
    Shadow,
    Unused,
    UnusedObjects,
    DstExcessiveopen,
    PortExcessiveopen,
    Knownportopen,
    Virusportopen,
    Mgmtportopen,
    SrcAnyopen,
    DstAnyopen,
    Noevidence,
    Compliancecheck,
    Disabled,
    Invalid,
    Manual,
}

impl Category {
    /// Number of categories in every result bundle
    pub const COUNT: usize = 18;

    /// Human-readable label for reports
    pub const fn label(self) -> &'static str {
        match self {
            Category::Expired => "Expired Rule",
            Category::Permanent => "Permanent Rule",
            Category::Redundant => "Redundant Rule",
            Category::Shadow => "Shadow Rule",
            Category::Unused => "Unused Rule",
            Category::UnusedObjects => "Unused Objects (Session-Based)",
            Category::DstExcessiveopen => "Dst Excessive Open",
            Category::PortExcessiveopen => "Service Excessive Open",
            Category::Knownportopen => "Well-Known Port Open",
            Category::Virusportopen => "Virus Port Open",
            Category::Mgmtportopen => "Mgmt Port Open",
            Category::SrcAnyopen => "Src ANY Open",
            Category::DstAnyopen => "Dst ANY Open",
            Category::Noevidence => "NOEVIDENCE Rule",
            Category::Compliancecheck => "Compliance",
            Category::Disabled => "Inactive Rule",
            Category::Invalid => "Invalid Rule",
            Category::Manual => "Manual Rule",
        }
    }

    /// Report section the category is grouped under
    pub const fn section(self) -> &'static str {
        match self {
            Category::Expired | Category::Permanent => "Period Management",
            Category::Redundant | Category::Shadow | Category::Unused | Category::UnusedObjects => {
                "Policy Utilization"
            }
            Category::DstExcessiveopen | Category::PortExcessiveopen => "Policy Scope",
            Category::Knownportopen | Category::Virusportopen | Category::Mgmtportopen => {
                "Service Safety"
            }
            Category::SrcAnyopen
            | Category::DstAnyopen
            | Category::Noevidence
            | Category::Compliancecheck => "Security Compliance",
            Category::Disabled | Category::Invalid | Category::Manual => "Miscellaneous",
        }
    }
}

/// Category name → set of flagged rule ids
///
/// Every category is always present, possibly empty. Serializes as a JSON
/// object mapping each category name to a sorted integer array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationResult {
    sets: BTreeMap<Category, BTreeSet<RuleId>>,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassificationResult {
    pub fn new() -> Self {
        Self {
            sets: Category::iter().map(|c| (c, BTreeSet::new())).collect(),
        }
    }

    pub fn insert(&mut self, category: Category, rule_id: RuleId) -> bool {
        self.sets.entry(category).or_default().insert(rule_id)
    }

    pub fn extend(&mut self, category: Category, ids: impl IntoIterator<Item = RuleId>) {
        self.sets.entry(category).or_default().extend(ids);
    }

    /// Rule ids flagged with `category`
    pub fn get(&self, category: Category) -> &BTreeSet<RuleId> {
        static EMPTY: BTreeSet<RuleId> = BTreeSet::new();
        self.sets.get(&category).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, category: Category, rule_id: RuleId) -> bool {
        self.get(category).contains(&rule_id)
    }

    /// Categories a rule is flagged with, in report order
    pub fn categories_for(&self, rule_id: RuleId) -> Vec<Category> {
        self.sets
            .iter()
            .filter(|(_, ids)| ids.contains(&rule_id))
            .map(|(category, _)| *category)
            .collect()
    }

    /// Per-category rule counts
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        self.sets.iter().map(|(c, ids)| (*c, ids.len())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &BTreeSet<RuleId>)> {
        self.sets.iter().map(|(c, ids)| (*c, ids))
    }

    /// Union of all flagged rule ids
    pub fn flagged_rules(&self) -> BTreeSet<RuleId> {
        self.sets.values().flatten().copied().collect()
    }

    /// Fills in categories absent from a deserialized bundle.
    pub(crate) fn backfill(mut self) -> Self {
        for category in Category::iter() {
            self.sets.entry(category).or_default();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_count_is_fixed() {
        assert_eq!(Category::iter().count(), Category::COUNT);
    }

    #[test]
    fn test_new_result_has_every_category_empty() {
        let result = ClassificationResult::new();
        assert_eq!(result.iter().count(), Category::COUNT);
        assert!(result.iter().all(|(_, ids)| ids.is_empty()));
        assert!(result.flagged_rules().is_empty());
    }

    #[test]
    fn test_serializes_as_name_to_array() {
        let mut result = ClassificationResult::new();
        result.insert(Category::Shadow, 9);
        result.insert(Category::Shadow, 2);
        result.insert(Category::DstExcessiveopen, 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["shadow"], serde_json::json!([2, 9]));
        assert_eq!(json["dst_excessiveopen"], serde_json::json!([2]));
        assert_eq!(json["unused_objects"], serde_json::json!([]));
        assert_eq!(json.as_object().unwrap().len(), Category::COUNT);
    }

    #[test]
    fn test_deserialize_then_backfill() {
        let json = r#"{"expired": [1, 4]}"#;
        let result: ClassificationResult = serde_json::from_str(json).unwrap();
        let result = result.backfill();
        assert!(result.contains(Category::Expired, 4));
        assert_eq!(result.iter().count(), Category::COUNT);
    }

    #[test]
    fn test_categories_for_follows_report_order() {
        let mut result = ClassificationResult::new();
        result.insert(Category::Manual, 5);
        result.insert(Category::Expired, 5);
        result.insert(Category::Shadow, 5);
        result.insert(Category::Shadow, 6);
        assert_eq!(
            result.categories_for(5),
            vec![Category::Expired, Category::Shadow, Category::Manual]
        );
    }

    #[test]
    fn test_labels_and_names() {
        assert_eq!(Category::Knownportopen.label(), "Well-Known Port Open");
        assert_eq!(Category::UnusedObjects.to_string(), "unused_objects");
        assert_eq!(
            "src_anyopen".parse::<Category>().unwrap(),
            Category::SrcAnyopen
        );
        assert_eq!(Category::Disabled.section(), "Miscellaneous");
    }
}
