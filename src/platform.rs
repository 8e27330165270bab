//! Cross-platform path resolution.
//!
//! This module provides the conventional locations of each package manager's
//! global cache or store, used when the manager's own executable is not
//! available to report its configured location.
//!
//! All lookup functions return `Option<PathBuf>` - returning `None` if the
//! directory doesn't exist or can't be determined.

pub use crate::model::Platform;

use crate::model::PackageManagerKind;
use std::path::{Path, PathBuf};

/// Returns the conventional global cache/store directory for a manager.
///
/// Platform-specific locations:
///
/// | Manager | Linux | macOS | Windows |
/// |---------|-------|-------|---------|
/// | npm | `~/.npm/_cacache` | `~/.npm/_cacache` | `%LOCALAPPDATA%\npm-cache\_cacache` |
/// | yarn | `~/.cache/yarn` | `~/Library/Caches/Yarn` | `%LOCALAPPDATA%\Yarn\Cache` |
/// | pnpm | `~/.local/share/pnpm/store` | `~/Library/pnpm/store` | `%LOCALAPPDATA%\pnpm\store` |
///
/// Yarn 2+ keeps its shared cache in `~/.yarn/berry/cache`; that is tried
/// after the classic location.
///
/// Returns `None` if no candidate directory exists.
pub fn default_cache_dir(kind: PackageManagerKind) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    convention_candidates(kind, Platform::current(), &home, dirs::data_local_dir().as_deref())
        .into_iter()
        .find(|path| path.is_dir())
}

/// Candidate cache roots for a manager on a platform, most likely first.
pub(crate) fn convention_candidates(
    kind: PackageManagerKind,
    platform: Platform,
    home: &Path,
    local_data: Option<&Path>,
) -> Vec<PathBuf> {
    let local = local_data
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.join("AppData").join("Local"));

    match (kind, platform) {
        (PackageManagerKind::Npm, Platform::Windows) => {
            vec![local.join("npm-cache").join("_cacache")]
        }
        (PackageManagerKind::Npm, _) => vec![home.join(".npm").join("_cacache")],

        (PackageManagerKind::Yarn, Platform::Linux) => vec![
            home.join(".cache").join("yarn"),
            home.join(".yarn").join("berry").join("cache"),
        ],
        (PackageManagerKind::Yarn, Platform::MacOS) => vec![
            home.join("Library").join("Caches").join("Yarn"),
            home.join(".yarn").join("berry").join("cache"),
        ],
        (PackageManagerKind::Yarn, Platform::Windows) => vec![
            local.join("Yarn").join("Cache"),
            home.join(".yarn").join("berry").join("cache"),
        ],

        (PackageManagerKind::Pnpm, Platform::Linux) => vec![
            home.join(".local").join("share").join("pnpm").join("store"),
            home.join(".pnpm-store"),
        ],
        (PackageManagerKind::Pnpm, Platform::MacOS) => vec![
            home.join("Library").join("pnpm").join("store"),
            home.join(".pnpm-store"),
        ],
        (PackageManagerKind::Pnpm, Platform::Windows) => vec![
            local.join("pnpm").join("store"),
            home.join(".pnpm-store"),
        ],

        (PackageManagerKind::Unknown, _) => Vec::new(),
    }
}

/// Returns the configuration directory for threatscan.
///
/// Platform-specific locations:
/// - Linux: `~/.config/threatscan/`
/// - macOS: `~/Library/Application Support/threatscan/`
/// - Windows: `%APPDATA%\threatscan\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threatscan")
}
