//! Report writers for relgen.
//!
//! Formats the core passes for the outside world:
//!
//! - [`write_audit`] - plain-text audit listing, one line per operation
//! - [`write_audit_json`] - structured audit report, optionally wrapped
//!   as a standalone script
//! - [`write_diff_report`] - unified-diff-flavored listing of a diff
//!   queue
//! - [`write_model_json`] - normalized JSON dump of a whole model

mod audit_json;
mod audit_text;
mod diff_report;
mod model_json;

pub use audit_json::write_audit_json;
pub use audit_text::write_audit;
pub use diff_report::write_diff_report;
pub use model_json::write_model_json;
