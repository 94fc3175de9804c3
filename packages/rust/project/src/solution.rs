//! Visual Studio solution file parsing.

use std::sync::LazyLock;

use regex::Regex;

/// `Project("{type-guid}") = "Name", "relative\path.csproj", "{project-guid}"`
static PROJECT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*Project\("\{[^}]*\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)"\s*,\s*"\{[^}]*\}""#)
        .expect("valid regex")
});

const PROJECT_EXTENSION: &str = ".csproj";
const TEST_PROJECT_SUFFIX: &str = ".tests.csproj";

/// Repo-relative paths of the C# projects referenced by a solution file.
///
/// Paths are resolved against the solution's directory and use `/`
/// separators. Test projects (`*.Tests.csproj`) and solution folders are
/// excluded.
pub fn project_paths(solution_path: &str, content: &str) -> Vec<String> {
    let solution_dir = solution_path
        .replace('\\', "/")
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();

    PROJECT_LINE_RE
        .captures_iter(content)
        .map(|caps| caps[1].replace('\\', "/"))
        .filter(|path| {
            let lower = path.to_ascii_lowercase();
            lower.ends_with(PROJECT_EXTENSION) && !lower.ends_with(TEST_PROJECT_SUFFIX)
        })
        .map(|path| join_relative(&solution_dir, &path))
        .collect()
}

/// Join `relative` onto `dir`, resolving `.` and `..` segments.
fn join_relative(dir: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
