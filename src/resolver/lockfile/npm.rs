//! package-lock.json reader
//!
//! # Schema versions
//!
//! - v1: `dependencies` keyed by package name, nested for duplicates
//! - v2: both `packages` and the legacy `dependencies`
//! - v3: only `packages`, keyed by install path
//!
//! ```json
//! {
//!   "lockfileVersion": 3,
//!   "packages": {
//!     "": { "name": "my-app" },
//!     "node_modules/left-pad": { "version": "1.3.0" },
//!     "node_modules/express/node_modules/debug": { "version": "2.6.9" }
//!   }
//! }
//! ```

use super::LockfileReader;
use serde::Deserialize;
use std::collections::BTreeMap;

pub struct NpmLockReader;

#[derive(Deserialize)]
struct NpmLockFile {
    #[serde(default, rename = "lockfileVersion")]
    lockfile_version: Option<u64>,
    #[serde(default)]
    packages: BTreeMap<String, NpmPackageEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, NpmLegacyEntry>,
}

#[derive(Deserialize)]
struct NpmPackageEntry {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
struct NpmLegacyEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, NpmLegacyEntry>,
}

impl LockfileReader for NpmLockReader {
    fn file_name(&self) -> &'static str {
        "package-lock.json"
    }

    fn extract_from_str(&self, package: &str, content: &str) -> Option<String> {
        let lock: NpmLockFile = serde_json::from_str(content).ok()?;
        let schema = lock.lockfile_version.unwrap_or(1);

        if schema >= 2 {
            if let Some(version) = from_packages(&lock.packages, package) {
                return Some(version);
            }
        }

        if schema <= 2 {
            return from_dependencies(&lock.dependencies, package);
        }

        None
    }
}

/// Looks up `node_modules/<pkg>` first, then nested `.../node_modules/<pkg>`.
fn from_packages(packages: &BTreeMap<String, NpmPackageEntry>, package: &str) -> Option<String> {
    let top_level = format!("node_modules/{}", package);
    if let Some(version) = packages.get(&top_level).and_then(entry_version) {
        return Some(version);
    }

    let nested = format!("/node_modules/{}", package);
    packages
        .iter()
        .filter(|(key, _)| key.ends_with(&nested))
        .find_map(|(_, entry)| entry_version(entry))
}

fn entry_version(entry: &NpmPackageEntry) -> Option<String> {
    non_empty(entry.version.as_deref())
}

/// Searches the legacy tree breadth-first so the hoisted copy wins.
fn from_dependencies(deps: &BTreeMap<String, NpmLegacyEntry>, package: &str) -> Option<String> {
    let mut level: Vec<&BTreeMap<String, NpmLegacyEntry>> = vec![deps];

    while !level.is_empty() {
        let mut next = Vec::new();
        for map in level {
            if let Some(version) = map
                .get(package)
                .and_then(|entry| non_empty(entry.version.as_deref()))
            {
                return Some(version);
            }
            next.extend(
                map.values()
                    .map(|entry| &entry.dependencies)
                    .filter(|deps| !deps.is_empty()),
            );
        }
        level = next;
    }

    None
}

fn non_empty(version: Option<&str>) -> Option<String> {
    version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
