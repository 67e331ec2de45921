//! Rulebase audit engine
//!
//! - [`rulebase`]: input records (rules, decomposed ranges, compliance references)
//! - [`address`]: address descriptor resolution into interval sets
//! - [`coverage`]: interval coverage, length and overlap tests
//! - [`dedup`] and [`shadow`]: cross-rule redundancy and shadowing
//! - [`predicates`]: per-rule category predicates
//! - [`classifier`]: the analysis pass producing a [`result::ClassificationResult`]
//! - [`usage`]: traffic-log correlation for unused rules
//! - [`report`] and [`snapshots`]: report views and their persistent store
//! - [`bundle`]: JSON input bundles
//! - [`error`]: error types

pub mod address;
pub mod bundle;
pub mod classifier;
pub mod coverage;
pub mod dedup;
pub mod error;
pub mod predicates;
pub mod report;
pub mod result;
pub mod rulebase;
pub mod shadow;
pub mod snapshots;
pub mod usage;
