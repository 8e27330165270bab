//! Installed-package lookup under a project's `node_modules`.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory dependencies are installed into.
pub const INSTALL_ROOT: &str = "node_modules";

#[derive(Deserialize)]
struct InstalledManifest {
    version: Option<String>,
}

/// Path where `package` would be installed below `dir`.
///
/// Scoped names map to nested directories: `@scope/pkg` becomes
/// `node_modules/@scope/pkg`.
pub fn install_path(dir: &Path, package: &str) -> PathBuf {
    package
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(dir.join(INSTALL_ROOT), |path, segment| path.join(segment))
}

/// Reads the `version` of an installed package's own manifest.
pub fn extract(package: &str, dir: &Path) -> Option<String> {
    let manifest = install_path(dir, package).join("package.json");
    let content = fs::read_to_string(&manifest).ok()?;
    let parsed: InstalledManifest = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(path = %manifest.display(), error = %e, "installed manifest unreadable");
            return None;
        }
    };

    let version = parsed.version?.trim().to_string();
    if version.is_empty() {
        None
    } else {
        debug!(package, version = %version, path = %manifest.display(), "resolved from install");
        Some(version)
    }
}
