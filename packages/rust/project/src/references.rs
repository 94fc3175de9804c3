//! Dependency declarations and the conservative reference merge.

use std::collections::BTreeMap;

use auditor_rules::compare_versions;
use auditor_shared::NormalizedReference;
use tracing::trace;

/// SDK-style `<PackageReference Include=".." Version=".." PrivateAssets=".." />`.
///
/// `version` and `private_assets` may come from either an attribute or a
/// child element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDeclaration {
    pub include: Option<String>,
    pub version: Option<String>,
    pub private_assets: Option<String>,
}

/// Legacy `<Reference Include="Id, Version=X, Culture=.., PublicKeyToken=..">`
/// with an optional `<Private>` child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyDeclaration {
    pub include: Option<String>,
    pub private: Option<String>,
}

/// One dependency declaration, in either schema generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Modern(PackageDeclaration),
    Legacy(AssemblyDeclaration),
}

/// A single declaration, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub identifier: String,
    pub version: String,
    pub is_private: bool,
}

impl Declaration {
    /// Convert to a raw reference. Declarations without an identifier yield `None`.
    pub fn to_reference(&self) -> Option<RawReference> {
        match self {
            Self::Modern(decl) => {
                let identifier = non_empty(decl.include.as_deref())?;
                Some(RawReference {
                    identifier: identifier.to_string(),
                    version: decl.version.as_deref().unwrap_or_default().trim().to_string(),
                    is_private: decl
                        .private_assets
                        .as_deref()
                        .is_some_and(|p| p.trim().eq_ignore_ascii_case("all")),
                })
            }
            Self::Legacy(decl) => {
                let include = non_empty(decl.include.as_deref())?;
                let mut tokens = include.split(',');
                let identifier = non_empty(tokens.next())?;
                let version = tokens
                    .filter_map(|token| token.trim().split_once('='))
                    .find(|(key, _)| key.trim().eq_ignore_ascii_case("Version"))
                    .map(|(_, value)| value.trim().to_string())
                    .unwrap_or_default();
                Some(RawReference {
                    identifier: identifier.to_string(),
                    version,
                    is_private: decl.private.as_deref().map(str::trim) == Some("True"),
                })
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Extract raw references, skipping declarations that lack an identifier.
pub fn extract_references(declarations: &[Declaration]) -> Vec<RawReference> {
    declarations
        .iter()
        .filter_map(|decl| {
            let reference = decl.to_reference();
            if reference.is_none() {
                trace!(?decl, "skipping declaration without identifier");
            }
            reference
        })
        .collect()
}

/// Deduplicate by identifier (case-insensitive).
///
/// The merged version is the minimum version seen and the merged privacy is
/// true only if every occurrence was private. The result is sorted by
/// identifier; the first spelling of an identifier is kept.
pub fn merge_references(raw: impl IntoIterator<Item = RawReference>) -> Vec<NormalizedReference> {
    let mut merged: BTreeMap<String, NormalizedReference> = BTreeMap::new();

    for reference in raw {
        let key = reference.identifier.to_ascii_lowercase();
        match merged.get_mut(&key) {
            Some(existing) => {
                if compare_versions(&reference.version, &existing.version).is_lt() {
                    existing.version = reference.version;
                }
                existing.is_private &= reference.is_private;
            }
            None => {
                merged.insert(
                    key,
                    NormalizedReference {
                        identifier: reference.identifier,
                        version: reference.version,
                        is_private: reference.is_private,
                    },
                );
            }
        }
    }

    merged.into_values().collect()
}
