//! Markdown audit report.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use auditor_rules::ComplianceRules;
use auditor_shared::{Entity, TrackedDependency};

/// Where addin descriptors are expected to live on the website.
const LISTING_URL: &str = "https://github.com/cake-build/website/tree/develop/addins";

/// Settings that appear in the report's information section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub recommended_version: String,
    pub expected_framework: String,
    pub core_dependency: String,
    pub common_dependency: String,
    pub listing_url: String,
}

impl From<&ComplianceRules> for ReportOptions {
    fn from(rules: &ComplianceRules) -> Self {
        Self {
            recommended_version: rules.recommended_version.clone(),
            expected_framework: rules.expected_framework.clone(),
            core_dependency: rules.core_dependency.clone(),
            common_dependency: rules.common_dependency.clone(),
            listing_url: LISTING_URL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

struct Column {
    header: String,
    align: Align,
    content: fn(&Entity) -> String,
}

fn name_cell(entity: &Entity) -> String {
    let url = entity
        .repo
        .as_ref()
        .map(|r| r.url.clone())
        .or_else(|| entity.registry_url.as_ref().map(|u| u.to_string()))
        .unwrap_or_default();
    format!("[{}]({url})", entity.name)
}

/// Privacy is only meaningful for a dependency that is referenced.
fn privacy_cell(dependency: &TrackedDependency) -> String {
    if dependency.is_referenced() {
        dependency.is_private.to_string()
    } else {
        String::new()
    }
}

fn columns(options: &ReportOptions) -> Vec<Column> {
    let core = &options.core_dependency;
    let common = &options.common_dependency;
    vec![
        Column {
            header: "Name".into(),
            align: Align::Left,
            content: name_cell,
        },
        Column {
            header: format!("{} Version", display_name(core)),
            align: Align::Center,
            content: |e| e.analysis.core.version.clone(),
        },
        Column {
            header: format!("{} IsPrivate", display_name(core)),
            align: Align::Center,
            content: |e| privacy_cell(&e.analysis.core),
        },
        Column {
            header: format!("{} Version", display_name(common)),
            align: Align::Center,
            content: |e| e.analysis.common.version.clone(),
        },
        Column {
            header: format!("{} IsPrivate", display_name(common)),
            align: Align::Center,
            content: |e| privacy_cell(&e.analysis.common),
        },
        Column {
            header: "Framework".into(),
            align: Align::Center,
            content: |e| {
                e.frameworks
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        },
        Column {
            header: "Icon".into(),
            align: Align::Center,
            content: |e| e.analysis.uses_expected_icon.to_string(),
        },
        Column {
            header: "YAML".into(),
            align: Align::Center,
            content: |e| e.analysis.has_listing.to_string(),
        },
    ]
}

/// `Cake.Core` reads as "Cake Core" in headers.
fn display_name(identifier: &str) -> String {
    identifier.replace('.', " ")
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the audit report.
///
/// Entities without notes fill the main table, sorted by name. Entities with
/// notes are listed under `# Exceptions` instead.
#[instrument(skip_all, fields(entities = entities.len()))]
pub fn render_markdown(
    entities: &[Entity],
    options: &ReportOptions,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    write_information(&mut out, options, generated_at);

    let mut clean: Vec<&Entity> = entities.iter().filter(|e| e.analysis.is_clean()).collect();
    clean.sort_by(|a, b| a.name.cmp(&b.name));
    let mut exceptions: Vec<&Entity> = entities.iter().filter(|e| !e.analysis.is_clean()).collect();
    exceptions.sort_by(|a, b| a.name.cmp(&b.name));

    write_table(&mut out, &columns(options), &clean);

    if !exceptions.is_empty() {
        let _ = writeln!(out, "\n# Exceptions\n");
        for entity in &exceptions {
            let _ = writeln!(out, "**{}**: {}  ", entity.name, entity.analysis.notes.join("; "));
        }
    }

    debug!(
        clean = clean.len(),
        exceptions = exceptions.len(),
        "rendered markdown report"
    );
    out
}

fn write_information(out: &mut String, options: &ReportOptions, generated_at: DateTime<Utc>) {
    let version = &options.recommended_version;
    let _ = writeln!(out, "# Information\n");
    let _ = writeln!(
        out,
        "- This report was generated on {} GMT",
        generated_at.format("%A, %B %-d, %Y at %H:%M:%S")
    );
    let _ = writeln!(out, "- The desired Cake version is `{version}`");
    let _ = writeln!(
        out,
        "- The `Version` columns show the version of {} and {} referenced by a given addin",
        options.core_dependency, options.common_dependency
    );
    let _ = writeln!(
        out,
        "- The `IsPrivate` columns indicate whether the references are marked as private. In other words, we are looking for references with the `PrivateAssets=All` attribute like in this example: `<PackageReference Include=\"{}\" Version=\"{version}\" PrivateAssets=\"All\" />`",
        options.common_dependency
    );
    let _ = writeln!(
        out,
        "- The `Framework` column shows the .NET framework(s) targeted by a given addin. Addins should target {} only (there is no need to multi-target)",
        options.expected_framework
    );
    let _ = writeln!(
        out,
        "- The `Icon` column indicates if the package for your addin uses the cake-contrib icon."
    );
    let _ = writeln!(
        out,
        "- The `YAML` column indicates if there is a `.yml` file describing the addin in this [repo]({}).",
        options.listing_url
    );
    let _ = writeln!(out);
}

fn write_table(out: &mut String, columns: &[Column], rows: &[&Entity]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|e| columns.iter().map(|c| (c.content)(e)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.header.chars().count()))
                .max()
                .unwrap_or(0)
                // Minimum of 3 keeps `:-:` valid.
                .max(3)
        })
        .collect();

    let _ = writeln!(out, "# Addins\n");

    let header: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();
    write_row(out, &header, &widths);

    for (column, width) in columns.iter().zip(&widths) {
        let rule = match column.align {
            Align::Left => "-".repeat(width + 2),
            Align::Center => format!(":{}:", "-".repeat(*width)),
        };
        let _ = write!(out, "|{rule}");
    }
    let _ = writeln!(out, "|");

    for row in &cells {
        write_row(out, row, &widths);
    }
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(out, "| {cell:<width$} ");
    }
    let _ = writeln!(out, "|");
}
