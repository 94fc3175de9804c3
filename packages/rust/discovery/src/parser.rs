//! Parsers for the website's YAML addin descriptors and the markdown status
//! list.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use auditor_shared::{AuditError, Result, SourceFlags};

use crate::sources::DiscoveredAddin;

/// Status list sections that describe addins. Others ("Websites",
/// "Deprecated", ...) are ignored.
const ADDIN_SECTIONS: [&str; 3] = ["Recipes", "Modules", "Addins"];

/// Header and separator rows preceding the data rows of a table.
const TABLE_HEADER_ROWS: usize = 2;

// ---------------------------------------------------------------------------
// Regex patterns
// ---------------------------------------------------------------------------

/// Matches `# Heading` at any level.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+(.+?)\s*#*\s*$").expect("heading regex"));

/// Matches `[text](url)`.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link regex"));

// ---------------------------------------------------------------------------
// Status list
// ---------------------------------------------------------------------------

/// Parse the addin tables of the status list.
///
/// Each row's first cell is `[name](url)` and its second cell the
/// maintainer. Rows without a link are skipped.
pub fn parse_status_list(content: &str) -> Vec<DiscoveredAddin> {
    let mut addins = Vec::new();
    let mut in_addin_section = false;
    let mut table_row = 0usize;

    for line in content.lines().map(str::trim) {
        if let Some(caps) = HEADING_RE.captures(line) {
            let title = caps[1].trim();
            in_addin_section = ADDIN_SECTIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(title));
            table_row = 0;
            continue;
        }

        if !in_addin_section || !line.starts_with('|') {
            continue;
        }

        table_row += 1;
        if table_row <= TABLE_HEADER_ROWS {
            continue;
        }

        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let Some(caps) = cells.first().and_then(|c| LINK_RE.captures(c)) else {
            continue;
        };

        let maintainer = cells.get(1).map(|m| m.to_string());
        addins.push(DiscoveredAddin::from_listing(
            caps[1].trim(),
            &caps[2],
            maintainer,
            SourceFlags::WEBSITE_LIST,
        ));
    }

    addins
}

// ---------------------------------------------------------------------------
// YAML descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct YamlDescriptor {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Repository", default)]
    repository: Option<String>,
    #[serde(rename = "Author", default)]
    author: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
}

/// Parse one `addins/*.yml` descriptor from the website repo.
pub fn parse_yaml_descriptor(content: &str) -> Result<DiscoveredAddin> {
    let descriptor: YamlDescriptor = serde_yaml::from_str(content)
        .map_err(|e| AuditError::parse(format!("invalid addin descriptor: {e}")))?;

    let mut addin = DiscoveredAddin::from_listing(
        descriptor.name.trim(),
        descriptor.repository.as_deref().unwrap_or_default(),
        descriptor.author,
        SourceFlags::YAML,
    );
    addin.description = descriptor.description.map(|d| d.trim().to_string());
    Ok(addin)
}
