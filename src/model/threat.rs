use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An inclusive `[min, max]` interval of vulnerable versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: String,
    pub max: String,
}

impl VersionRange {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

/// Vulnerability rule for a single package or tool.
///
/// Exact `patched_versions` always win over every vulnerable check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRule {
    pub vulnerable_versions: BTreeSet<String>,
    pub patched_versions: BTreeSet<String>,
    #[serde(
        rename = "min_vulnerable_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_vulnerable: Option<String>,
    pub vulnerable_ranges: Vec<VersionRange>,
}

/// Filesystem, content and process markers checked alongside version rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indicators {
    /// File-name globs (`*` wildcard).
    pub files: Vec<String>,
    /// Directory-name globs (`*` wildcard).
    pub directories: Vec<String>,
    /// Literal markers searched for in file contents.
    pub strings: Vec<String>,
    /// Running-process names.
    pub processes: Vec<String>,
}

impl Indicators {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.directories.is_empty()
            && self.strings.is_empty()
            && self.processes.is_empty()
    }
}

/// A loaded threat definition. Immutable for the duration of a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatDefinition {
    /// Base name of the definition file.
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub check_global_cache: bool,
    pub scan_home: bool,
    pub remediation: Vec<String>,
    pub package_rules: BTreeMap<String, VersionRule>,
    pub tool_rules: BTreeMap<String, VersionRule>,
    pub indicators: Indicators,
}

impl ThreatDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_package_rule(mut self, package: impl Into<String>, rule: VersionRule) -> Self {
        self.package_rules.insert(package.into(), rule);
        self
    }

    pub fn with_tool_rule(mut self, tool: impl Into<String>, rule: VersionRule) -> Self {
        self.tool_rules.insert(tool.into(), rule);
        self
    }

    /// Name shown in reports; falls back to the file id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserializes_schema_names() {
        let rule: VersionRule = serde_json::from_str(
            r#"{
                "vulnerable_versions": ["1.0.0"],
                "min_vulnerable_version": "2.0.0",
                "vulnerable_ranges": [{"min": "3.0.0", "max": "3.1.0"}]
            }"#,
        )
        .unwrap();

        assert!(rule.vulnerable_versions.contains("1.0.0"));
        assert!(rule.patched_versions.is_empty());
        assert_eq!(rule.min_vulnerable.as_deref(), Some("2.0.0"));
        assert_eq!(rule.vulnerable_ranges, vec![VersionRange::new("3.0.0", "3.1.0")]);
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let threat = ThreatDefinition::new("nx-compromise", "", "desc");
        assert_eq!(threat.display_name(), "nx-compromise");

        let threat = ThreatDefinition::new("nx-compromise", "Nx build system compromise", "desc");
        assert_eq!(threat.display_name(), "Nx build system compromise");
    }
}
