use crate::core::rulebase::RuleId;
use thiserror::Error;

/// Core error types for fwaudit
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A rule's source or destination descriptor could not be resolved
    #[error("Rule {rule_id}: invalid {direction} descriptor: {source}")]
    Descriptor {
        rule_id: RuleId,
        direction: Direction,
        #[source]
        source: AddressError,
    },

    /// A decomposed range lies outside the numeric universe or is inverted
    #[error("Rule {rule_id}: invalid decomposed range [{start}, {end}]")]
    InvalidRange { rule_id: RuleId, start: u64, end: u64 },

    /// Two rules share one identifier
    #[error("Duplicate rule id {0} in rulebase")]
    DuplicateRule(RuleId),

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// Snapshot operation failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Which side of a rule a descriptor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Source,
    Destination,
}

/// Address descriptor parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("malformed address range '{descriptor}': {reason}")]
    MalformedRange { descriptor: String, reason: String },

    #[error("malformed CIDR block '{descriptor}': {reason}")]
    MalformedCidr { descriptor: String, reason: String },

    #[error("malformed address list '{descriptor}': {reason}")]
    MalformedAddress { descriptor: String, reason: String },
}

/// Snapshot-specific errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Data directory not available")]
    DataDirUnavailable,
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl Error {
    /// Maps an error to a user-facing message with remediation hints.
    pub fn translate(&self) -> ErrorTranslation {
        match self {
            Error::Descriptor {
                rule_id,
                direction,
                source,
            } => {
                let base = ErrorTranslation::new(format!(
                    "Rule {rule_id} has an unreadable {direction} address object"
                ));
                match source {
                    AddressError::MalformedRange { .. } => base
                        .with_suggestion("Ranges use IP_<start>-<end>, e.g. IP_10.0.0.1-10.0.0.9")
                        .with_suggestion("The start address must not exceed the end address"),
                    AddressError::MalformedCidr { .. } => base
                        .with_suggestion("CIDR blocks use IP_<network>/<prefix>, e.g. IP_10.0.0.0/24")
                        .with_suggestion("IPv4 prefixes must be between 0 and 32"),
                    AddressError::MalformedAddress { .. } => base
                        .with_suggestion("Lists use comma-separated IPv4 literals, e.g. IP_10.0.0.1,IP_10.0.0.2")
                        .with_suggestion("IPv6 address objects are not supported"),
                }
            }
            Error::InvalidRange { rule_id, .. } => ErrorTranslation::new(format!(
                "Rule {rule_id} has a decomposed range outside the address/port universe"
            ))
            .with_suggestion("Re-run range decomposition for this firewall")
            .with_suggestion("Ranges must satisfy 0 <= start <= end <= 4294836225"),
            Error::DuplicateRule(id) => {
                ErrorTranslation::new(format!("Rule id {id} appears more than once"))
                    .with_suggestion("Export the rulebase of a single firewall per bundle")
            }
            Error::Serialization(e) => ErrorTranslation::new(format!("Unreadable input: {e}"))
                .with_suggestion("Check the bundle is valid JSON")
                .with_suggestion("Rule ids must be integers and timestamps RFC 3339"),
            Error::Snapshot(SnapshotError::ChecksumMismatch { .. }) => {
                ErrorTranslation::new("Stored report snapshot failed its integrity check")
                    .with_suggestion("The snapshot file was modified after it was written")
                    .with_suggestion("Re-run the analysis with --save to capture a fresh snapshot")
            }
            other => ErrorTranslation::new(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
