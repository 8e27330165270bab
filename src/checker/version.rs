use crate::model::{ClassificationStatus, ResolvedVersion, VersionRule};
use std::cmp::Ordering;

/// Compares two versions component by component.
///
/// Components are split on `.` and read as their leading digits (a component
/// with no leading digits counts as `0`). The shorter sequence is padded with
/// zeros, so `1.2` equals `1.2.0`. Pre-release text is not ordered; callers
/// strip it first with [`strip_prerelease`].
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = a.split('.').map(numeric_component).collect();
    let right: Vec<u64> = b.split('.').map(numeric_component).collect();
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

fn numeric_component(part: &str) -> u64 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Strips leading range operators (`^ ~ > = <`) and a leading `v`.
pub fn normalize_version(version: &str) -> &str {
    let trimmed = version
        .trim()
        .trim_start_matches(['^', '~', '>', '=', '<'])
        .trim_start();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

/// Drops everything from the first `-` onwards.
pub fn strip_prerelease(version: &str) -> &str {
    match version.find('-') {
        Some(pos) => &version[..pos],
        None => version,
    }
}

/// Classifies a resolved version against a rule.
pub fn classify(resolved: &ResolvedVersion, rule: &VersionRule) -> ClassificationStatus {
    classify_version(resolved.version.as_deref(), rule)
}

/// Classifies a bare version string against a rule.
///
/// Order of checks: absent, patched, exact vulnerable, ranges, threshold.
/// The threshold is strict: a version equal to `min_vulnerable` is safe.
pub fn classify_version(version: Option<&str>, rule: &VersionRule) -> ClassificationStatus {
    let Some(raw) = version else {
        return ClassificationStatus::NotFound;
    };
    let version = normalize_version(raw);
    if version.is_empty() {
        return ClassificationStatus::NotFound;
    }

    if rule.patched_versions.contains(version) {
        return ClassificationStatus::Patched;
    }

    if rule.vulnerable_versions.contains(version) {
        return ClassificationStatus::Vulnerable;
    }

    let core = strip_prerelease(version);

    if !rule.vulnerable_ranges.is_empty() {
        let in_range = rule.vulnerable_ranges.iter().any(|range| {
            let min = strip_prerelease(normalize_version(&range.min));
            let max = strip_prerelease(normalize_version(&range.max));
            compare_versions(core, min) != Ordering::Less
                && compare_versions(core, max) != Ordering::Greater
        });
        if in_range {
            return ClassificationStatus::Vulnerable;
        }
    }

    if let Some(threshold) = &rule.min_vulnerable {
        let threshold = strip_prerelease(normalize_version(threshold));
        if compare_versions(core, threshold) == Ordering::Greater {
            return ClassificationStatus::Vulnerable;
        }
    }

    ClassificationStatus::Safe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{VersionRange, VersionSource};

    fn set(items: &[&str]) -> std::collections::BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn found(version: &str) -> ResolvedVersion {
        ResolvedVersion::found(version, VersionSource::RootLock)
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0", "10.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0.1", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_non_numeric_components() {
        assert_eq!(compare_versions("1.x", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2rc", "1.2"), Ordering::Equal);
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("^1.2.3"), "1.2.3");
        assert_eq!(normalize_version("~1.2.3"), "1.2.3");
        assert_eq!(normalize_version(">=1.2.3"), "1.2.3");
        assert_eq!(normalize_version("v20.1.0"), "20.1.0");
        assert_eq!(normalize_version(" 1.0.0 "), "1.0.0");
    }

    #[test]
    fn test_strip_prerelease() {
        assert_eq!(strip_prerelease("14.3.0-canary.77"), "14.3.0");
        assert_eq!(strip_prerelease("1.0.0"), "1.0.0");
    }

    #[test]
    fn test_exact_lists() {
        let rule = VersionRule {
            vulnerable_versions: set(&["1.0.0", "1.1.0"]),
            patched_versions: set(&["1.0.1", "1.1.1"]),
            ..VersionRule::default()
        };

        assert_eq!(classify(&found("1.0.0"), &rule), ClassificationStatus::Vulnerable);
        assert_eq!(classify(&found("1.0.1"), &rule), ClassificationStatus::Patched);
        assert_eq!(classify(&found("2.0.0"), &rule), ClassificationStatus::Safe);
        assert_eq!(
            classify(&ResolvedVersion::none(), &rule),
            ClassificationStatus::NotFound
        );
    }

    #[test]
    fn test_normalized_before_matching() {
        let rule = VersionRule {
            vulnerable_versions: set(&["1.0.0"]),
            ..VersionRule::default()
        };
        assert_eq!(classify(&found("^1.0.0"), &rule), ClassificationStatus::Vulnerable);
        assert_eq!(classify(&found("v1.0.0"), &rule), ClassificationStatus::Vulnerable);
    }

    #[test]
    fn test_threshold_is_strict() {
        let rule = VersionRule {
            min_vulnerable: Some("14.3.0-canary.77".to_string()),
            ..VersionRule::default()
        };

        assert_eq!(classify(&found("14.2.0"), &rule), ClassificationStatus::Safe);
        assert_eq!(classify(&found("14.3.0-canary.77"), &rule), ClassificationStatus::Safe);
        assert_eq!(classify(&found("15.0.0"), &rule), ClassificationStatus::Vulnerable);
    }

    #[test]
    fn test_range_is_inclusive() {
        let rule = VersionRule {
            vulnerable_ranges: vec![VersionRange::new("2.0.0", "2.999.999")],
            ..VersionRule::default()
        };

        assert_eq!(classify(&found("2.0.0"), &rule), ClassificationStatus::Vulnerable);
        assert_eq!(classify(&found("2.999.999"), &rule), ClassificationStatus::Vulnerable);
        assert_eq!(classify(&found("3.0.0"), &rule), ClassificationStatus::Safe);
        assert_eq!(classify(&found("1.9.9"), &rule), ClassificationStatus::Safe);
    }

    #[test]
    fn test_any_range_matches() {
        let rule = VersionRule {
            vulnerable_ranges: vec![
                VersionRange::new("2.0.0", "2.999.999"),
                VersionRange::new("3.0.0", "3.0.5"),
            ],
            ..VersionRule::default()
        };
        assert_eq!(classify(&found("3.0.0"), &rule), ClassificationStatus::Vulnerable);
        assert_eq!(classify(&found("3.0.6"), &rule), ClassificationStatus::Safe);
    }

    #[test]
    fn test_range_ignores_prerelease() {
        let rule = VersionRule {
            vulnerable_ranges: vec![VersionRange::new("2.0.0-beta.1", "2.1.0")],
            ..VersionRule::default()
        };
        assert_eq!(classify(&found("2.1.0-rc.1"), &rule), ClassificationStatus::Vulnerable);
    }

    #[test]
    fn test_patched_overrides_vulnerable() {
        let rule = VersionRule {
            vulnerable_versions: set(&["1.0.1"]),
            patched_versions: set(&["1.0.1"]),
            vulnerable_ranges: vec![VersionRange::new("1.0.0", "1.9.9")],
            min_vulnerable: Some("0.1.0".to_string()),
        };
        assert_eq!(classify(&found("1.0.1"), &rule), ClassificationStatus::Patched);
    }

    #[test]
    fn test_empty_rule_is_safe_when_found() {
        let rule = VersionRule::default();
        assert_eq!(classify(&found("1.0.0"), &rule), ClassificationStatus::Safe);
        assert_eq!(
            classify(&ResolvedVersion::none(), &rule),
            ClassificationStatus::NotFound
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let rule = VersionRule {
            min_vulnerable: Some("1.0.0".to_string()),
            ..VersionRule::default()
        };
        let first = classify_version(Some("1.2.0"), &rule);
        for _ in 0..10 {
            assert_eq!(classify_version(Some("1.2.0"), &rule), first);
        }
    }
}
