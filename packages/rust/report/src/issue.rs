//! Body of the compliance issue filed on an addin's repository.

use std::fmt::Write;

use auditor_rules::ComplianceRules;
use auditor_shared::{Entity, TrackedDependency, UNKNOWN_VERSION};

/// Title of every issue the audit files. Open issues with this exact title
/// are treated as already filed.
pub const ISSUE_TITLE: &str = "Recommended changes resulting from automated audit";

const INTRODUCTION: &str = "We performed an automated audit of your Cake addin and found that it does not follow all the best practices.\n\nWe encourage you to make the following modifications:\n\n";

/// Checklist of recommended changes for `entity`, or `None` when there is
/// nothing to recommend.
pub fn issue_body(entity: &Entity, rules: &ComplianceRules) -> Option<String> {
    let analysis = &entity.analysis;
    let mut items = String::new();

    upgrade_item(&mut items, &rules.core_dependency, &analysis.core, rules);
    upgrade_item(&mut items, &rules.common_dependency, &analysis.common, rules);
    privacy_item(&mut items, &rules.core_dependency, &analysis.core, rules);
    privacy_item(&mut items, &rules.common_dependency, &analysis.common, rules);

    if !analysis.targets_expected_framework {
        let _ = writeln!(
            items,
            "- [ ] Your addin should target {framework}\nPlease note that there is no need to multi-target: as of Cake {version}, {framework} is sufficient.",
            framework = rules.expected_framework,
            version = rules.recommended_version
        );
    }
    if !analysis.uses_expected_icon {
        let _ = writeln!(
            items,
            "- [ ] The nuget package for your addin should use the cake-contrib icon.\nSpecifically, your addin's `.csproj` should have a line like this: `<PackageIconUrl>{}</PackageIconUrl>`.",
            rules.expected_icon_url
        );
    }
    if !analysis.has_listing {
        let _ = writeln!(
            items,
            "- [ ] There should be a YAML file describing your addin on the cake web site\nSpecifically, you should add a `.yml` file in this [repo](https://github.com/cake-build/website/tree/develop/addins)"
        );
    }

    if items.is_empty() {
        None
    } else {
        Some(format!("{INTRODUCTION}{items}"))
    }
}

/// An outdated version is only actionable when it is known.
fn upgrade_item(
    items: &mut String,
    identifier: &str,
    dependency: &TrackedDependency,
    rules: &ComplianceRules,
) {
    if dependency.is_referenced()
        && dependency.version != UNKNOWN_VERSION
        && !dependency.is_up_to_date
    {
        let _ = writeln!(
            items,
            "- [ ] You are currently referencing {identifier} {}. Please upgrade to {}",
            dependency.version, rules.recommended_version
        );
    }
}

fn privacy_item(
    items: &mut String,
    identifier: &str,
    dependency: &TrackedDependency,
    rules: &ComplianceRules,
) {
    if !dependency.is_private {
        let _ = writeln!(
            items,
            "- [ ] The {identifier} reference should be private.\nSpecifically, your addin's `.csproj` should have a line similar to this:\n`<PackageReference Include=\"{identifier}\" Version=\"{}\" PrivateAssets=\"All\" />`",
            rules.recommended_version
        );
    }
}
