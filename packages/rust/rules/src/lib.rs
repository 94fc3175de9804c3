//! Version comparison and compliance rules for audited addins.
//!
//! Everything here is pure: no I/O, no async. The analysis stage calls
//! [`analyze`] once per entity after every enrichment stage has run.

pub mod compliance;
pub mod version;

pub use compliance::{ComplianceRules, analyze};
pub use version::{compare_versions, is_up_to_date, normalize_version};
