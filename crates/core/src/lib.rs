//! qcflow core data models.
//!
//! This crate defines the run record, check results, and verdict types that
//! every stage of a QC run exchanges.

#![warn(missing_docs)]

// Core identities
mod id;

// Verdicts and run state
mod verdict;
mod run;
mod check;

// Re-exports
pub use id::QcPid;
pub use verdict::{StatusCode, Verdict};
pub use run::{total_verdict, Attribute, RunKey, RunRecord, RESERVED_ATTRIBUTES, TOTAL_PASS};
pub use check::{CheckInput, CheckResult, CheckSpec};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
