//! Dotted version strings: up-to-date check, normalization, ordering.

use std::cmp::Ordering;

use auditor_shared::UNKNOWN_VERSION;

/// Number of components kept by [`normalize_version`].
const NORMALIZED_COMPONENTS: usize = 3;

/// Integer value of a version component's leading digits (`"0-beta"` → 0).
fn component_value(component: &str) -> Option<u64> {
    let digits: &str = {
        let trimmed = component.trim();
        let end = trimmed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(trimmed.len(), |(i, _)| i);
        &trimmed[..end]
    };
    digits.parse().ok()
}

/// Whether `current` satisfies `desired`.
///
/// - An empty `current` is never up to date.
/// - `desired`'s component count is the minimum precision: a `current` with
///   fewer components is not up to date.
/// - Components are compared left to right as integers; any component where
///   `current < desired` fails the check. Extra trailing components in
///   `current` are ignored.
/// - A `current` component without leading digits fails the check; a
///   `desired` component without leading digits counts as 0.
pub fn is_up_to_date(current: &str, desired: &str) -> bool {
    if current.trim().is_empty() {
        return false;
    }

    let current: Vec<&str> = current.split('.').collect();
    let desired: Vec<&str> = desired.split('.').collect();

    if current.len() < desired.len() {
        return false;
    }

    current.iter().zip(&desired).all(|(c, d)| {
        let Some(c) = component_value(c) else {
            return false;
        };
        c >= component_value(d).unwrap_or(0)
    })
}

/// Keep the first three dot-separated components; empty input becomes
/// [`UNKNOWN_VERSION`].
pub fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.is_empty() {
        return UNKNOWN_VERSION.to_string();
    }
    version
        .split('.')
        .take(NORMALIZED_COMPONENTS)
        .collect::<Vec<_>>()
        .join(".")
}

/// Numeric component-wise ordering used when merging references.
///
/// Missing components count as 0, so `"1.2"` equals `"1.2.0"`. Empty and
/// unparsable versions sort below every parsable one.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Option<Vec<u64>> {
        if v.trim().is_empty() {
            return None;
        }
        v.split('.').map(component_value).collect()
    };

    match (parse(a), parse(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let len = a.len().max(b.len());
            (0..len)
                .map(|i| {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    x.cmp(&y)
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_to_date_examples() {
        assert!(!is_up_to_date("", "0.26.0"));
        assert!(!is_up_to_date("", ""));
        assert!(is_up_to_date("0.26.0", "0.26.0"));
        assert!(!is_up_to_date("0.25.9", "0.26.0"));
        assert!(!is_up_to_date("1.2", "1.1.0"));
        assert!(is_up_to_date("0.26.1", "0.26.0"));
        assert!(is_up_to_date("0.26.0.1234", "0.26.0"));
    }

    #[test]
    fn up_to_date_requires_every_component() {
        // Component-wise, not lexicographic: the minor component is compared
        // even when the major one is already higher.
        assert!(!is_up_to_date("1.0.0", "0.26.0"));
        assert!(is_up_to_date("1.26.0", "0.26.0"));
    }

    #[test]
    fn up_to_date_handles_non_numeric_components() {
        assert!(!is_up_to_date(UNKNOWN_VERSION, "0.26.0"));
        assert!(is_up_to_date("0.26.0-beta", "0.26.0"));
        assert!(is_up_to_date("0.26.0", "0.26.x"));
    }

    #[test]
    fn up_to_date_is_monotone() {
        let desired = "0.26.0";
        let versions = [
            [0, 25, 0],
            [0, 26, 0],
            [0, 26, 3],
            [0, 30, 0],
            [1, 26, 0],
            [2, 40, 1],
        ];
        for c in &versions {
            let current = format!("{}.{}.{}", c[0], c[1], c[2]);
            if !is_up_to_date(&current, desired) {
                continue;
            }
            for c2 in &versions {
                if c2.iter().zip(c).all(|(a, b)| a >= b) {
                    let newer = format!("{}.{}.{}", c2[0], c2[1], c2[2]);
                    assert!(
                        is_up_to_date(&newer, desired),
                        "{newer} should be up to date since {current} is"
                    );
                }
            }
        }
    }

    #[test]
    fn normalize_examples() {
        assert_eq!(normalize_version("0.26.0.0"), "0.26.0");
        assert_eq!(normalize_version(""), UNKNOWN_VERSION);
        assert_eq!(normalize_version("0.26"), "0.26");
        assert_eq!(normalize_version(" 1.2.3 "), "1.2.3");
    }

    #[test]
    fn compare_is_numeric() {
        assert_eq!(compare_versions("0.9.0", "0.26.0"), Ordering::Less);
        assert_eq!(compare_versions("0.30.0", "0.26.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("", "0.1.0"), Ordering::Less);
        assert_eq!(compare_versions("garbage", "0.0.1"), Ordering::Less);
        assert_eq!(compare_versions("", ""), Ordering::Equal);
    }
}
