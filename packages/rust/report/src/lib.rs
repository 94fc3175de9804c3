//! Human-readable outputs of an audit: the markdown report and the body of
//! the compliance issue filed on addin repositories.

mod issue;
mod markdown;

pub use issue::{ISSUE_TITLE, issue_body};
pub use markdown::{ReportOptions, render_markdown};
