//! XML project file reader for both MSBuild schema generations.

use auditor_shared::{AuditError, Result};
use roxmltree::{Document, Node};

use crate::references::{AssemblyDeclaration, Declaration, PackageDeclaration};

/// Namespace of legacy (pre SDK-style) MSBuild project files.
pub const MSBUILD_NAMESPACE: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// A parsed project file.
pub struct ProjectDocument<'input> {
    doc: Document<'input>,
}

impl<'input> ProjectDocument<'input> {
    /// Parse project file content. Malformed XML is a recoverable parse error.
    pub fn parse(text: &'input str) -> Result<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let doc = Document::parse(text)
            .map_err(|e| AuditError::parse(format!("invalid project file: {e}")))?;
        Ok(Self { doc })
    }

    /// Every dependency declaration in document order.
    ///
    /// `PackageReference` elements are read regardless of namespace;
    /// `Reference` elements only in the legacy MSBuild namespace.
    pub fn declarations(&self) -> Vec<Declaration> {
        self.doc
            .descendants()
            .filter(Node::is_element)
            .filter_map(|node| {
                let tag = node.tag_name();
                match tag.name() {
                    "PackageReference" => Some(Declaration::Modern(PackageDeclaration {
                        include: node.attribute("Include").map(str::to_string),
                        version: attribute_or_child(node, "Version"),
                        private_assets: attribute_or_child(node, "PrivateAssets"),
                    })),
                    "Reference" if tag.namespace() == Some(MSBUILD_NAMESPACE) => {
                        Some(Declaration::Legacy(AssemblyDeclaration {
                            include: node.attribute("Include").map(str::to_string),
                            private: child_text(node, "Private"),
                        }))
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Target framework identifiers in document order. May contain
    /// duplicates.
    ///
    /// `TargetFramework` holds one identifier and `TargetFrameworks` a
    /// semicolon-delimited list. `TargetFrameworkVersion` counts only in the
    /// legacy MSBuild namespace.
    pub fn target_frameworks(&self) -> Vec<String> {
        self.doc
            .descendants()
            .filter(Node::is_element)
            .flat_map(|node| {
                let tag = node.tag_name();
                let text = node.text().unwrap_or_default();
                let values: Vec<&str> = match tag.name() {
                    "TargetFrameworks" => text.split(';').collect(),
                    "TargetFramework" => vec![text],
                    "TargetFrameworkVersion" if tag.namespace() == Some(MSBUILD_NAMESPACE) => {
                        vec![text]
                    }
                    _ => Vec::new(),
                };
                values
                    .into_iter()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
        .and_then(|child| child.text())
        .map(|text| text.trim().to_string())
}

fn attribute_or_child(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::to_string)
        .or_else(|| child_text(node, name))
}
