//! Lockfile version extraction.
//!
//! Each supported lockfile format has a [`LockfileReader`]:
//!
//! | Reader | File | Format |
//! |--------|------|--------|
//! | [`NpmLockReader`] | `package-lock.json` | JSON, schema versions 1-3 |
//! | [`YarnLockReader`] | `yarn.lock` | line blocks, classic and Berry dialects |
//! | [`PnpmLockReader`] | `pnpm-lock.yaml` | YAML with path-like keys |
//!
//! Readers never fail: a missing file, unreadable file, malformed content or
//! no matching entry all return `None`. Empty version strings are never
//! treated as found.

mod npm;
mod pnpm;
mod yarn;

pub use npm::NpmLockReader;
pub use pnpm::PnpmLockReader;
pub use yarn::YarnLockReader;

use crate::model::PackageManagerKind;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extracts a package's locked version from one lockfile format.
pub trait LockfileReader: Send + Sync {
    /// Returns the lockfile name this reader handles.
    fn file_name(&self) -> &'static str;

    /// Finds the locked version of `package` in lockfile text.
    fn extract_from_str(&self, package: &str, content: &str) -> Option<String>;

    /// Reads `lockfile` and finds the locked version of `package`.
    fn extract(&self, package: &str, lockfile: &Path) -> Option<String> {
        let content = match fs::read_to_string(lockfile) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %lockfile.display(), error = %e, "lockfile unreadable");
                return None;
            }
        };
        self.extract_from_str(package, &content)
            .filter(|version| !version.trim().is_empty())
    }
}

/// Returns the reader for a package manager, if it has a lockfile.
pub fn reader_for(kind: PackageManagerKind) -> Option<Box<dyn LockfileReader>> {
    match kind {
        PackageManagerKind::Npm => Some(Box::new(NpmLockReader)),
        PackageManagerKind::Yarn => Some(Box::new(YarnLockReader)),
        PackageManagerKind::Pnpm => Some(Box::new(PnpmLockReader)),
        PackageManagerKind::Unknown => None,
    }
}

/// Finds `package` in whichever lockfiles exist in `dir`.
///
/// The lockfile of the detected `kind` is read first, then the remaining
/// formats in the order pnpm, yarn, npm.
pub fn resolve_in_dir(dir: &Path, package: &str, kind: PackageManagerKind) -> Option<String> {
    let order = std::iter::once(kind)
        .chain(PackageManagerKind::KNOWN.into_iter().filter(|k| *k != kind));

    for candidate in order {
        let Some(reader) = reader_for(candidate) else {
            continue;
        };
        let path = dir.join(reader.file_name());
        if !path.is_file() {
            continue;
        }
        if let Some(version) = reader.extract(package, &path) {
            debug!(package, version = %version, path = %path.display(), "resolved from lockfile");
            return Some(version);
        }
    }

    None
}

/// Trims surrounding whitespace and quotes from a scalar value.
fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}
