//! Package manager detection for a directory.

use crate::model::PackageManagerKind;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const MANIFEST: &str = "package.json";

#[derive(Deserialize)]
struct ManagerField {
    #[serde(rename = "packageManager")]
    package_manager: Option<String>,
}

/// Identifies the package manager governing `dir`.
///
/// Lockfiles are checked in the order pnpm, yarn, npm. Without a lockfile the
/// manifest's `packageManager` field (`"<name>@<version>"`) decides. Anything
/// unreadable or unrecognised yields [`PackageManagerKind::Unknown`].
pub fn detect(dir: &Path) -> PackageManagerKind {
    for kind in PackageManagerKind::KNOWN {
        if let Some(lockfile) = kind.lockfile_name() {
            if dir.join(lockfile).is_file() {
                return kind;
            }
        }
    }

    manifest_manager(dir).unwrap_or(PackageManagerKind::Unknown)
}

fn manifest_manager(dir: &Path) -> Option<PackageManagerKind> {
    let content = fs::read_to_string(dir.join(MANIFEST)).ok()?;
    let field: ManagerField = serde_json::from_str(&content).ok()?;
    let spec = field.package_manager?;
    let name = spec.split('@').next().unwrap_or_default();
    match PackageManagerKind::from_name(name) {
        PackageManagerKind::Unknown => None,
        kind => Some(kind),
    }
}
