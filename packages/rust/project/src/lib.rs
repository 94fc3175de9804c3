//! Build-project and solution file parsing.
//!
//! - [`ProjectDocument`] reads a project file and yields its dependency
//!   [`Declaration`]s and target frameworks, across both the SDK-style and
//!   the legacy MSBuild schema.
//! - [`extract_references`] / [`merge_references`] turn declarations into the
//!   entity's deduplicated reference list.
//! - [`solution`] finds project paths in a solution file.

pub mod document;
pub mod references;
pub mod solution;

pub use document::ProjectDocument;
pub use references::{
    AssemblyDeclaration, Declaration, PackageDeclaration, RawReference, extract_references,
    merge_references,
};
pub use solution::project_paths;
