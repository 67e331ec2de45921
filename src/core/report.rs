//! Report views over classification results
//!
//! - [`FirewallReport`]: every rule of one firewall with the categories it
//!   was flagged with
//! - [`Summary`]: per-firewall category counts across several firewalls
//! - [`ReportSnapshot`]: the immutable record persisted after an analysis
//!
//! Text renderers produce the CLI's plain-text output.

use crate::core::result::{Category, ClassificationResult};
use crate::core::rulebase::{Action, Firewall, Rule, RuleId};
use crate::validators::sanitize_comment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use strum::IntoEnumIterator;
use uuid::Uuid;

/// Descriptive fields of a rule as shown in reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleRow {
    pub id: RuleId,
    pub action: Action,
    pub source: String,
    pub from_zone: Option<String>,
    pub destination: String,
    pub to_zone: Option<String>,
    pub service: String,
    pub expire: Option<DateTime<Utc>>,
    pub comment: String,
}

impl From<&Rule> for RuleRow {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id,
            action: rule.action,
            source: rule.source.clone(),
            from_zone: rule.from_zone.clone(),
            destination: rule.destination.clone(),
            to_zone: rule.to_zone.clone(),
            service: rule.service.clone(),
            expire: rule.expire,
            comment: rule.comment.clone(),
        }
    }
}

/// A rule row plus the categories it falls in, in report order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleReport {
    #[serde(flatten)]
    pub row: RuleRow,
    pub types: Vec<Category>,
}

/// Per-rule report for one firewall
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallReport {
    pub firewall_id: i64,
    pub firewall_name: String,
    pub rules: Vec<RuleReport>,
}

impl FirewallReport {
    pub fn new(firewall: &Firewall, rows: &[RuleRow], result: &ClassificationResult) -> Self {
        Self {
            firewall_id: firewall.id,
            firewall_name: firewall.name.clone(),
            rules: rows
                .iter()
                .map(|row| RuleReport {
                    row: row.clone(),
                    types: result.categories_for(row.id),
                })
                .collect(),
        }
    }

    pub fn from_rules(firewall: &Firewall, rules: &[Rule], result: &ClassificationResult) -> Self {
        let rows: Vec<RuleRow> = rules.iter().map(RuleRow::from).collect();
        Self::new(firewall, &rows, result)
    }

    /// Plain-text listing, one block per rule, flagged categories indented
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Firewall {} ({}): {} rules",
            self.firewall_name,
            self.firewall_id,
            self.rules.len()
        );

        for rule in &self.rules {
            let row = &rule.row;
            let _ = writeln!(
                out,
                "\n#{:<6} {:<5} {} [{}] -> {} [{}]  service={}",
                row.id,
                row.action.as_ref(),
                row.source,
                row.from_zone.as_deref().unwrap_or("-"),
                row.destination,
                row.to_zone.as_deref().unwrap_or("-"),
                row.service
            );
            if let Some(expire) = row.expire {
                let _ = writeln!(out, "        expires {}", expire.format("%Y-%m-%d %H:%M"));
            }
            let comment = sanitize_comment(row.comment.trim());
            if !comment.is_empty() {
                let _ = writeln!(out, "        \"{comment}\"");
            }
            for category in &rule.types {
                let _ = writeln!(out, "        ! {}", category.label());
            }
        }

        out
    }
}

/// Plain-text listing of every category with its rule ids, grouped by section
pub fn render_classification(firewall: &Firewall, result: &ClassificationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Firewall {} ({}): {} flagged rules",
        firewall.name,
        firewall.id,
        result.flagged_rules().len()
    );

    let mut last_section = "";
    for (category, ids) in result.iter() {
        if category.section() != last_section {
            last_section = category.section();
            let _ = writeln!(out, "\n[{last_section}]");
        }
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "  {:<30}{:>5}  {}",
            category.label(),
            ids.len(),
            ids.join(", ")
        );
    }

    out
}

/// Category counts for one firewall
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallCounts {
    pub firewall_id: i64,
    pub firewall_name: String,
    pub rule_count: usize,
    pub counts: BTreeMap<Category, usize>,
}

/// Category counts across several firewalls
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub id_to_name: BTreeMap<i64, String>,
    pub firewalls: Vec<FirewallCounts>,
    pub totals: BTreeMap<Category, usize>,
}

impl Summary {
    pub fn new() -> Self {
        Self {
            totals: Category::iter().map(|c| (c, 0)).collect(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, firewall: &Firewall, rule_count: usize, result: &ClassificationResult) {
        let counts = result.counts();
        for (category, count) in &counts {
            *self.totals.entry(*category).or_default() += count;
        }
        self.id_to_name.insert(firewall.id, firewall.name.clone());
        self.firewalls.push(FirewallCounts {
            firewall_id: firewall.id,
            firewall_name: firewall.name.clone(),
            rule_count,
            counts,
        });
    }

    /// Category × firewall count table grouped by report section
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = write!(out, "{:<22}{:<32}", "Section", "Category");
        for fw in &self.firewalls {
            let _ = write!(out, "{:>12}", truncate(&fw.firewall_name, 11));
        }
        let _ = writeln!(out, "{:>8}", "Total");

        let mut last_section = "";
        for category in Category::iter() {
            let section = if category.section() == last_section {
                ""
            } else {
                last_section = category.section();
                last_section
            };
            let _ = write!(out, "{:<22}{:<32}", section, category.label());
            for fw in &self.firewalls {
                let count = fw.counts.get(&category).copied().unwrap_or(0);
                let _ = write!(out, "{count:>12}");
            }
            let total = self.totals.get(&category).copied().unwrap_or(0);
            let _ = writeln!(out, "{total:>8}");
        }

        out
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{head}~")
    }
}

/// Immutable record of one analysis, persisted by the snapshot store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSnapshot {
    pub id: Uuid,
    pub firewall_id: i64,
    pub firewall_name: String,
    pub captured_at: DateTime<Utc>,
    pub rules: Vec<RuleRow>,
    pub types: ClassificationResult,
}

impl ReportSnapshot {
    pub fn capture(
        firewall: &Firewall,
        rules: &[Rule],
        types: ClassificationResult,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            firewall_id: firewall.id,
            firewall_name: firewall.name.clone(),
            captured_at,
            rules: rules.iter().map(RuleRow::from).collect(),
            types,
        }
    }

    pub fn firewall(&self) -> Firewall {
        Firewall {
            id: self.firewall_id,
            name: self.firewall_name.clone(),
        }
    }

    /// Rebuilds the per-rule view from the stored rows and category sets
    pub fn individual(&self) -> FirewallReport {
        FirewallReport::new(&self.firewall(), &self.rules, &self.types)
    }
}
