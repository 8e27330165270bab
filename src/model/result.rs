use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    RootLock,
    WorkspaceLock,
    RootInstall,
    WorkspaceInstall,
    GlobalCache,
    ToolBinary,
    None,
}

impl VersionSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            VersionSource::RootLock => "lockfile",
            VersionSource::WorkspaceLock => "workspace lockfile",
            VersionSource::RootInstall => "node_modules",
            VersionSource::WorkspaceInstall => "workspace node_modules",
            VersionSource::GlobalCache => "global cache",
            VersionSource::ToolBinary => "executable",
            VersionSource::None => "-",
        }
    }
}

impl std::fmt::Display for VersionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An installed version, or its absence.
///
/// Absence is distinct from a version that matches no rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    pub version: Option<String>,
    pub source: VersionSource,
}

impl ResolvedVersion {
    pub fn none() -> Self {
        Self {
            version: None,
            source: VersionSource::None,
        }
    }

    pub fn found(version: impl Into<String>, source: VersionSource) -> Self {
        Self {
            version: Some(version.into()),
            source,
        }
    }

    pub fn is_found(&self) -> bool {
        self.version.is_some()
    }
}

impl Default for ResolvedVersion {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Vulnerable,
    Patched,
    Safe,
    NotFound,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Vulnerable => "vulnerable",
            ClassificationStatus::Patched => "patched",
            ClassificationStatus::Safe => "safe",
            ClassificationStatus::NotFound => "not found",
        }
    }
}

impl std::fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Package,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub subject: String,
    pub kind: SubjectKind,
    /// Scan root the package was resolved under; `None` for tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub resolved: ResolvedVersion,
    pub status: ClassificationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    File,
    Directory,
    String,
    Process,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::File => "file",
            IndicatorKind::Directory => "directory",
            IndicatorKind::String => "string",
            IndicatorKind::Process => "process",
        }
    }
}

/// A hit reported by one of the file, directory, string or process checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorFinding {
    pub kind: IndicatorKind,
    pub indicator: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatOutcome {
    pub threat: String,
    pub name: String,
    pub results: Vec<ClassificationResult>,
    pub indicators: Vec<IndicatorFinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
    pub triggered: bool,
}

impl ThreatOutcome {
    pub fn vulnerable(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results
            .iter()
            .filter(|r| r.status == ClassificationStatus::Vulnerable)
    }

    /// Number of vulnerable classifications plus indicator hits.
    pub fn finding_count(&self) -> usize {
        self.vulnerable().count() + self.indicators.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub roots: Vec<PathBuf>,
    pub outcomes: Vec<ThreatOutcome>,
    /// Threat definitions that failed to load.
    pub errors: Vec<String>,
}

impl ScanReport {
    pub fn new(roots: Vec<PathBuf>, outcomes: Vec<ThreatOutcome>) -> Self {
        Self {
            scan_time: Utc::now(),
            roots,
            outcomes,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn triggered(&self) -> impl Iterator<Item = &ThreatOutcome> {
        self.outcomes.iter().filter(|o| o.triggered)
    }

    pub fn found_indicators(&self) -> usize {
        self.outcomes.iter().map(ThreatOutcome::finding_count).sum()
    }
}
