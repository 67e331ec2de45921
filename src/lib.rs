//! fwaudit - firewall rulebase anomaly auditor
//!
//! Classifies every rule of a firewall rulebase into a fixed set of audit
//! categories: expired and permanent rules, redundant and shadowed rules,
//! excessively open scopes, sensitive ports, wildcard sources and
//! destinations, missing evidence, disabled and manual rules.
//!
//! # Architecture
//!
//! - [`core`] - Analysis engine, reports and the report snapshot store
//! - [`audit`] - Audit logging of analysis runs and snapshot writes
//! - [`validators`] - Input validation and sanitization
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories, atomic writes)
//!
//! # Example
//!
//! ```
//! use fwaudit::core::bundle::RulebaseBundle;
//! use fwaudit::{Category, RuleClassifier};
//!
//! let bundle = RulebaseBundle::from_json(r#"{
//!     "firewall": { "id": 1, "name": "edge-1" },
//!     "rules": [
//!         { "id": 1, "source": "any", "destination": "IP_10.0.0.5", "service": "HTTPS", "apply_id": "g" }
//!     ]
//! }"#)?;
//! let result = RuleClassifier::new().analyze(&bundle.analysis_input()?, chrono::Utc::now())?;
//! assert!(result.contains(Category::SrcAnyopen, 1));
//! # Ok::<(), fwaudit::Error>(())
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::classifier::{AnalysisInput, RuleClassifier};
pub use crate::core::error::{Error, Result};
pub use crate::core::result::{Category, ClassificationResult};
pub use crate::core::rulebase::Rule;
