//! Release tag comparison

use std::cmp::Ordering;

/// Strip whitespace and a leading `v` from a tag.
pub fn normalize_version(version: &str) -> String {
    version.trim().trim_start_matches('v').to_owned()
}

/// Compare two release tags.
///
/// Numeric components are compared first; when they tie, a tag carrying a
/// pre-release suffix (`-beta.1`) sorts before the plain release.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (core_a, pre_a) = split_prerelease(a);
    let (core_b, pre_b) = split_prerelease(b);

    let parts_a = parse_version_parts(&core_a);
    let parts_b = parse_version_parts(&core_b);
    let max_len = parts_a.len().max(parts_b.len());

    for i in 0..max_len {
        let a_part = parts_a.get(i).copied().unwrap_or(0);
        let b_part = parts_b.get(i).copied().unwrap_or(0);
        match a_part.cmp(&b_part) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    match (pre_a, pre_b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => compare_prerelease(&a, &b),
    }
}

/// Dot-separated identifiers left to right: numbers numerically, numbers
/// before words, and a shorter list first when one is a prefix of the other.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut ids_a = a.split('.');
    let mut ids_b = b.split('.');
    loop {
        let ordering = match (ids_a.next(), ids_b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.cmp(y),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// True when `available` is newer than `current`. An empty current version
/// always counts as outdated.
pub fn is_newer(current: &str, available: &str) -> bool {
    if normalize_version(current).is_empty() {
        return !normalize_version(available).is_empty();
    }
    compare_versions(available, current) == Ordering::Greater
}

fn split_prerelease(version: &str) -> (String, Option<String>) {
    let normalized = normalize_version(version);
    match normalized.split_once('-') {
        Some((core, pre)) => (core.to_string(), Some(pre.to_string())),
        None => (normalized, None),
    }
}

fn parse_version_parts(version: &str) -> Vec<u32> {
    version
        .split('.')
        .filter_map(|part| part.parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_version_strings() {
        assert_eq!(normalize_version("v2.0.0"), "2.0.0");
        assert_eq!(normalize_version("  v1.2.3  "), "1.2.3");
    }

    #[test]
    fn test_compares_numeric_parts() {
        assert_eq!(compare_versions("v1.2.0", "v1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "v2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("v3.0.0", "v2.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_prerelease_sorts_before_release() {
        assert_eq!(compare_versions("v2.0.0-beta.1", "v2.0.0"), Ordering::Less);
        assert_eq!(compare_versions("v2.0.0-beta.2", "v2.0.0-beta.1"), Ordering::Greater);
    }

    #[test]
    fn test_prerelease_numbers_compare_numerically() {
        assert_eq!(compare_versions("v2.0.0-beta.9", "v2.0.0-beta.10"), Ordering::Less);
        assert_eq!(compare_versions("v2.0.0-alpha.3", "v2.0.0-beta.1"), Ordering::Less);
        assert_eq!(compare_versions("v2.0.0-beta", "v2.0.0-beta.1"), Ordering::Less);
        assert_eq!(compare_versions("v2.0.0-beta.2", "v2.0.0-beta.rc"), Ordering::Less);
        assert!(is_newer("v2.0.0-beta.9", "v2.0.0-beta.10"));
    }

    #[test]
    fn test_detects_updates() {
        assert!(is_newer("v1.0.0", "v1.0.1"));
        assert!(!is_newer("v1.0.1", "v1.0.1"));
        assert!(is_newer("", "v1.0.0"));
    }
}
