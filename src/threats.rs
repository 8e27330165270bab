//! Threat definition loading.
//!
//! A threats directory holds one definition per `.json`, `.yaml` or `.yml`
//! file. The file stem becomes the threat id. Files with other extensions are
//! ignored when loading a directory.
//!
//! ```yaml
//! name: Shai-Hulud worm
//! description: Self-replicating npm worm
//! check_global_cache: true
//! packages: ["@ctrl/tinycolor", "ngx-bootstrap"]
//! vulnerable_versions: ["4.1.1", "4.1.2"]
//! package_versions:
//!   ngx-bootstrap:
//!     vulnerable_ranges: [{min: "18.1.4", max: "20.0.5"}]
//! tool_versions:
//!   node:
//!     min_vulnerable_version: "22.0.0"
//! files: ["bundle.js", "shai-hulud-workflow.yml"]
//! remediation:
//!   - Rotate npm tokens
//! ```
//!
//! A definition that cannot be read or parsed, or lacks `name` or
//! `description`, is reported as a [`ThreatError`] and skipped. The others
//! still load.

use crate::error::ThreatError;
use crate::model::{Indicators, ThreatDefinition, VersionRule};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// On-disk shape of a definition file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThreatFile {
    name: Option<String>,
    description: Option<String>,
    cve: Option<String>,
    reference: Option<String>,
    check_global_cache: bool,
    scan_home: bool,

    // Legacy flat rule shared by every entry of `packages`.
    packages: Vec<String>,
    vulnerable_versions: BTreeSet<String>,
    patched_versions: BTreeSet<String>,
    min_vulnerable_version: Option<String>,

    package_versions: BTreeMap<String, VersionRule>,
    tool_versions: BTreeMap<String, VersionRule>,
    remediation: Vec<String>,

    files: Vec<String>,
    directories: Vec<String>,
    strings: Vec<String>,
    processes: Vec<String>,
}

impl ThreatFile {
    fn flat_rule(&self) -> VersionRule {
        VersionRule {
            vulnerable_versions: self.vulnerable_versions.clone(),
            patched_versions: self.patched_versions.clone(),
            min_vulnerable: self.min_vulnerable_version.clone(),
            vulnerable_ranges: Vec::new(),
        }
    }

    fn into_definition(self, id: String, path: &Path) -> Result<ThreatDefinition, ThreatError> {
        let name = required(self.name.as_deref(), "name", path)?;
        let description = required(self.description.as_deref(), "description", path)?;

        let flat = self.flat_rule();
        let mut package_rules: BTreeMap<String, VersionRule> = self
            .packages
            .iter()
            .map(|package| package.trim())
            .filter(|package| !package.is_empty())
            .map(|package| (package.to_string(), flat.clone()))
            .collect();
        package_rules.extend(self.package_versions);

        Ok(ThreatDefinition {
            id,
            name,
            description,
            cve: self.cve,
            reference: self.reference,
            check_global_cache: self.check_global_cache,
            scan_home: self.scan_home,
            remediation: self.remediation,
            package_rules,
            tool_rules: self.tool_versions,
            indicators: Indicators {
                files: self.files,
                directories: self.directories,
                strings: self.strings,
                processes: self.processes,
            },
        })
    }
}

fn required(value: Option<&str>, field: &'static str, path: &Path) -> Result<String, ThreatError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ThreatError::MissingField {
            path: path.to_path_buf(),
            field,
        }),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| EXTENSIONS.contains(&ext.as_str()))
}

/// Definitions that loaded plus the per-file errors of those that did not.
#[derive(Debug, Default)]
pub struct LoadedThreats {
    pub threats: Vec<ThreatDefinition>,
    pub errors: Vec<ThreatError>,
}

impl LoadedThreats {
    /// Keeps only the threats whose id is in `ids`. An empty list keeps all.
    pub fn retain_ids(&mut self, ids: &[String]) {
        if !ids.is_empty() {
            self.threats.retain(|threat| ids.iter().any(|id| id == &threat.id));
        }
    }
}

/// Loads a single definition file.
pub fn load_threat_file(path: &Path) -> Result<ThreatDefinition, ThreatError> {
    let Some(ext) = extension(path) else {
        return Err(ThreatError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    };

    let content = fs::read_to_string(path).map_err(|source| ThreatError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: Result<ThreatFile, String> = if ext == "json" {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };
    let file = parsed.map_err(|reason| ThreatError::Parse {
        path: path.to_path_buf(),
        reason,
    })?;

    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();
    let threat = file.into_definition(id, path)?;
    debug!(
        id = %threat.id,
        packages = threat.package_rules.len(),
        tools = threat.tool_rules.len(),
        "loaded threat definition"
    );
    Ok(threat)
}

/// Loads every definition in a directory, or the single file at `path`.
///
/// Fails only when `path` does not exist or cannot be listed.
pub fn load_threats(path: &Path) -> Result<LoadedThreats> {
    let mut loaded = LoadedThreats::default();

    if path.is_file() {
        match load_threat_file(path) {
            Ok(threat) => loaded.threats.push(threat),
            Err(e) => loaded.errors.push(e),
        }
        return Ok(loaded);
    }

    let entries = fs::read_dir(path)
        .with_context(|| format!("cannot read threats directory {}", path.display()))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && extension(path).is_some())
        .collect();
    files.sort();

    for file in files {
        match load_threat_file(&file) {
            Ok(threat) => loaded.threats.push(threat),
            Err(e) => {
                warn!(error = %e, "skipping threat definition");
                loaded.errors.push(e);
            }
        }
    }

    Ok(loaded)
}
