//! Rulebase data structures consumed by the audit engine
//!
//! This module defines the immutable inputs of an analysis pass:
//!
//! - [`Rule`]: one firewall policy line as exported by the rule store
//! - [`DecomposedRange`]: one numeric interval extracted from a rule's
//!   service or address object, tagged with its [`RangeDimension`]
//! - [`ComplianceReference`]: one sensitive port/address interval of a
//!   [`ComplianceCategory`]
//!
//! # Numeric Universe
//!
//! Port and address ranges live in `[0, UNIVERSE_MAX]`. The bound is a fixed
//! system parameter shared with the rule store's check constraints and is
//! deliberately smaller than `u32::MAX`.
//!
//! # Example
//!
//! ```
//! use fwaudit::core::rulebase::{Action, Rule};
//!
//! let rule = Rule {
//!     id: 7,
//!     source: "IP_10.0.0.0/24".to_string(),
//!     destination: "any".to_string(),
//!     service: "HTTPS".to_string(),
//!     comment: "ticket 4411".to_string(),
//!     expire: None,
//!     apply_id: Some("grp-1".to_string()),
//!     revision: 0,
//!     action: Action::Allow,
//!     from_zone: None,
//!     to_zone: None,
//! };
//! assert!(!rule.is_any_service());
//! ```

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Rule identifier as assigned by the rule store
pub type RuleId = i64;

/// Upper bound of the port/address universe (inclusive)
pub const UNIVERSE_MAX: u64 = 4_294_836_225;

/// Reserved descriptor value meaning "match everything"
pub const WILDCARD: &str = "any";

/// Marker prefix carried by concrete IPv4 address descriptors
pub const ADDRESS_PREFIX: &str = "IP_";

/// Revision marker the store assigns to manually entered rules
pub const MANUAL_REVISION: i32 = -1;

/// A service whose port ranges add up to more than this is excessively open
pub const PORT_BREADTH_THRESHOLD: u64 = 100;

/// Expiration dates at or beyond this instant mean "never expires"
pub fn permanent_sentinel() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Identity of the device a rulebase belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Firewall {
    pub id: i64,
    pub name: String,
}

/// Rule action
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Matching traffic is permitted
    #[default]
    #[strum(serialize = "allow")]
    Allow,
    /// Matching traffic is dropped
    #[strum(serialize = "deny")]
    Deny,
}

/// One firewall policy line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: RuleId,
    /// Source descriptor (`any`, a group token, or an `IP_` address object)
    pub source: String,
    /// Destination descriptor, same grammar as `source`
    pub destination: String,
    /// Service descriptor; `any` is the wildcard
    pub service: String,
    /// Evidence text; the store's `null` reads as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comment: String,
    /// Expiration instant; zone-less store timestamps are taken as UTC
    #[serde(default, deserialize_with = "store_timestamp")]
    pub expire: Option<DateTime<Utc>>,
    /// Reference to the apply group; absent means administratively disabled
    #[serde(default)]
    pub apply_id: Option<String>,
    #[serde(default, alias = "rivision")]
    pub revision: i32,
    #[serde(default)]
    pub action: Action,
    /// Ingress zone, carried through to reports only
    #[serde(default, alias = "from_ip")]
    pub from_zone: Option<String>,
    /// Egress zone, carried through to reports only
    #[serde(default, alias = "to_ip")]
    pub to_zone: Option<String>,
}

impl Rule {
    pub fn is_any_service(&self) -> bool {
        self.service == WILDCARD
    }

    pub fn is_any_source(&self) -> bool {
        self.source == WILDCARD
    }

    pub fn is_any_destination(&self) -> bool {
        self.destination == WILDCARD
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn store_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_store_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// Parses an RFC 3339 timestamp, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` one as UTC
pub fn parse_store_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Which part of a rule a decomposed range was extracted from
///
/// Serialized by name; [`RangeDimension::from_ctype`] maps the store's numeric
/// dimension codes.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RangeDimension {
    ServicePortTcp,
    ServicePortUdp,
    SourceAddress,
    DestinationAddress,
}

impl RangeDimension {
    /// Maps the store's `ctype` column to a dimension
    pub const fn from_ctype(ctype: u8) -> Option<Self> {
        match ctype {
            0 => Some(Self::ServicePortTcp),
            1 => Some(Self::ServicePortUdp),
            2 => Some(Self::SourceAddress),
            3 => Some(Self::DestinationAddress),
            _ => None,
        }
    }

    pub const fn ctype(self) -> u8 {
        match self {
            Self::ServicePortTcp => 0,
            Self::ServicePortUdp => 1,
            Self::SourceAddress => 2,
            Self::DestinationAddress => 3,
        }
    }
}

/// One contiguous numeric interval owned by a rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecomposedRange {
    pub rule_id: RuleId,
    pub dimension: RangeDimension,
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for DecomposedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} {} [{}, {}]",
            self.rule_id, self.dimension, self.start, self.end
        )
    }
}

/// Sensitive-port registry a compliance reference belongs to
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
pub enum ComplianceCategory {
    /// Well-known risky ports
    #[serde(alias = "wn")]
    KnownRisk,
    /// Ports associated with malware
    #[serde(alias = "vi")]
    Virus,
    /// Management-plane ports
    #[serde(alias = "mn")]
    Management,
}

impl ComplianceCategory {
    /// Maps the store's short type tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "wn" | "known_risk" => Some(Self::KnownRisk),
            "vi" | "virus" => Some(Self::Virus),
            "mn" | "management" => Some(Self::Management),
            _ => None,
        }
    }
}

/// One interval of a compliance registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceReference {
    pub category: ComplianceCategory,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub name: Option<String>,
}
