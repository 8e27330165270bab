//! Global cache and store lookups.
//!
//! [`locate`] asks the manager's executable for its configured cache or store
//! (`npm config get cache`, `yarn cache dir`, `pnpm store path`) and falls back
//! to the platform conventions in [`crate::platform`]. [`resolve`] then scans
//! that root for the package:
//!
//! - npm: the `_cacache/index-v5` entries, whose keys carry tarball URLs
//! - yarn: cache entries named after the package (`npm-<name>-<version>-...`
//!   for classic, `<name>-npm-<version>-...zip` for Berry)
//! - all: a bounded walk for manifests (`package.json`, pnpm `*-index.json`)
//!   whose declared name matches
//!
//! These scans are expensive and only run when the orchestrator's gate is
//! open. Every walk is bounded by depth and entry count.

use super::probe::CommandProbe;
use crate::model::PackageManagerKind;
use crate::platform;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;
use walkdir::WalkDir;

/// Maximum directory depth of a cache walk.
const MAX_SCAN_DEPTH: usize = 6;
/// Maximum number of entries visited by a single cache walk.
const MAX_SCAN_ENTRIES: usize = 50_000;
/// Manifests larger than this are not parsed.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

#[derive(Deserialize)]
struct CacheManifest {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Deserialize)]
struct IndexEntry {
    key: String,
}

/// Version lookup in a machine-wide package cache.
#[async_trait]
pub trait GlobalCacheLookup: Send + Sync {
    async fn lookup(&self, package: &str, kind: PackageManagerKind) -> Option<String>;
}

/// Filesystem-backed global cache lookup.
///
/// Located roots and lookup answers are remembered for the lifetime of the
/// value, so a package named by several threats is scanned for once.
pub struct GlobalCache {
    probe: Arc<dyn CommandProbe>,
    roots: Mutex<HashMap<PackageManagerKind, Option<PathBuf>>>,
    answers: Mutex<HashMap<(String, PackageManagerKind), Option<String>>>,
}

impl GlobalCache {
    pub fn new(probe: Arc<dyn CommandProbe>) -> Self {
        Self {
            probe,
            roots: Mutex::new(HashMap::new()),
            answers: Mutex::new(HashMap::new()),
        }
    }

    async fn root(&self, kind: PackageManagerKind) -> Option<PathBuf> {
        let cached = self
            .roots
            .lock()
            .ok()
            .and_then(|roots| roots.get(&kind).cloned());
        if let Some(root) = cached {
            return root;
        }

        let root = locate(kind, self.probe.as_ref()).await;
        if let Ok(mut roots) = self.roots.lock() {
            roots.insert(kind, root.clone());
        }
        root
    }

    async fn scan_roots(&self, package: &str, kind: PackageManagerKind) -> Option<String> {
        let kinds: Vec<PackageManagerKind> = match kind {
            PackageManagerKind::Unknown => PackageManagerKind::KNOWN.to_vec(),
            known => vec![known],
        };

        for kind in kinds {
            let Some(root) = self.root(kind).await else {
                continue;
            };
            let name = package.to_string();
            let found = tokio::task::spawn_blocking(move || resolve(&name, kind, &root))
                .await
                .ok()
                .flatten();
            if found.is_some() {
                return found;
            }
        }

        None
    }
}

#[async_trait]
impl GlobalCacheLookup for GlobalCache {
    async fn lookup(&self, package: &str, kind: PackageManagerKind) -> Option<String> {
        let key = (package.to_string(), kind);
        let cached = self
            .answers
            .lock()
            .ok()
            .and_then(|answers| answers.get(&key).cloned());
        if let Some(answer) = cached {
            return answer;
        }

        let answer = self.scan_roots(package, kind).await;
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(key, answer.clone());
        }
        answer
    }
}

/// Finds the global cache or store root for a manager.
pub async fn locate(kind: PackageManagerKind, probe: &dyn CommandProbe) -> Option<PathBuf> {
    let executable = kind.executable()?;
    let args: &[&str] = match kind {
        PackageManagerKind::Npm => &["config", "get", "cache"],
        PackageManagerKind::Yarn => &["cache", "dir"],
        PackageManagerKind::Pnpm => &["store", "path"],
        PackageManagerKind::Unknown => return None,
    };

    if let Some(output) = probe.output(executable, args).await {
        // Managers may print warnings before the path.
        let reported = output.lines().map(str::trim).rfind(|line| !line.is_empty());
        if let Some(path) = reported.filter(|line| *line != "undefined").map(PathBuf::from) {
            if path.is_dir() {
                debug!(%kind, path = %path.display(), "cache located via executable");
                return Some(path);
            }
        }
    }

    let fallback = platform::default_cache_dir(kind);
    if let Some(path) = &fallback {
        debug!(%kind, path = %path.display(), "cache located via platform convention");
    }
    fallback
}

/// Scans a located cache root for `package` and returns the first version.
pub fn resolve(package: &str, kind: PackageManagerKind, root: &Path) -> Option<String> {
    let found = match kind {
        PackageManagerKind::Npm => {
            npm_index_version(root, package).or_else(|| manifest_scan(root, package))
        }
        PackageManagerKind::Yarn => {
            yarn_entry_version(root, package).or_else(|| manifest_scan(root, package))
        }
        PackageManagerKind::Pnpm => manifest_scan(root, package),
        PackageManagerKind::Unknown => None,
    };

    if let Some(version) = &found {
        debug!(package, %kind, version = %version, "resolved from global cache");
    }
    found
}

fn bounded_walk(root: &Path, max_depth: usize) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .take(MAX_SCAN_ENTRIES)
}

/// Reads npm's content-addressed index for a registry tarball of `package`.
fn npm_index_version(root: &Path, package: &str) -> Option<String> {
    let cacache = if root.join("_cacache").is_dir() {
        root.join("_cacache")
    } else {
        root.to_path_buf()
    };
    let index = cacache.join("index-v5");
    if !index.is_dir() {
        return None;
    }

    let basename = package.rsplit('/').next().unwrap_or(package);
    let marker = format!("/{}/-/{}-", package, basename);

    bounded_walk(&index, MAX_SCAN_DEPTH)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| fs::read_to_string(entry.path()).ok())
        .find_map(|content| {
            content.lines().find_map(|line| {
                let (_, json) = line.split_once('\t')?;
                let entry: IndexEntry = serde_json::from_str(json).ok()?;
                tarball_version(&entry.key, package, &marker)
            })
        })
}

/// Version in a registry tarball URL. An unscoped name never matches inside
/// a scoped path such as `/@ctrl/tinycolor/-/tinycolor-4.1.1.tgz`.
fn tarball_version(key: &str, package: &str, marker: &str) -> Option<String> {
    let scoped = package.starts_with('@');
    key.match_indices(marker).find_map(|(pos, _)| {
        let parent = key[..pos].rsplit('/').next().unwrap_or("");
        if !scoped && parent.starts_with('@') {
            return None;
        }
        let rest = &key[pos + marker.len()..];
        let version = &rest[..rest.find(".tgz")?];
        if version.starts_with(|c: char| c.is_ascii_digit()) {
            Some(version.to_string())
        } else {
            None
        }
    })
}

/// Matches yarn cache entries named after the package.
fn yarn_entry_version(root: &Path, package: &str) -> Option<String> {
    let flat = package.replace('/', "-");
    let classic = format!("npm-{}-", flat);
    let berry = format!("{}-npm-", flat);

    bounded_walk(root, 2)
        .filter(|entry| entry.depth() > 0)
        .find_map(|entry| {
            let name = entry.file_name().to_str()?;
            if let Some(rest) = name.strip_prefix(&classic) {
                let installed = local_manifest_version(entry.path(), package);
                installed.or_else(|| entry_version(rest))
            } else if let Some(rest) = name.strip_prefix(&berry) {
                entry_version(rest.strip_suffix(".zip").unwrap_or(rest))
            } else {
                None
            }
        })
}

/// Classic yarn entries hold the unpacked package under `node_modules`.
fn local_manifest_version(entry_dir: &Path, package: &str) -> Option<String> {
    let manifest = super::local::install_path(entry_dir, package).join("package.json");
    read_manifest(&manifest)
        .filter(|m| m.name.as_deref() == Some(package))
        .and_then(|m| m.version)
}

/// Version part of a yarn entry name after the package prefix. The last two
/// `-` segments are the hash and checksum (or sha1 and `integrity`); the
/// version itself may contain `-`.
fn entry_version(rest: &str) -> Option<String> {
    let mut parts = rest.rsplitn(3, '-');
    let (_checksum, _hash) = (parts.next()?, parts.next()?);
    let candidate = parts.next()?;
    if candidate.starts_with(|c: char| c.is_ascii_digit()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Walks for manifests whose declared name is `package`.
fn manifest_scan(root: &Path, package: &str) -> Option<String> {
    bounded_walk(root, MAX_SCAN_DEPTH)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name == "package.json" || name.ends_with("-index.json"))
        })
        .filter_map(|entry| read_manifest(entry.path()))
        .filter(|manifest| manifest.name.as_deref() == Some(package))
        .find_map(|manifest| manifest.version.filter(|v| !v.trim().is_empty()))
}

fn read_manifest(path: &Path) -> Option<CacheManifest> {
    let size = fs::metadata(path).ok()?.len();
    if size > MAX_MANIFEST_BYTES {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedProbe(Option<String>);

    #[async_trait]
    impl CommandProbe for FixedProbe {
        async fn output(&self, _program: &str, _args: &[&str]) -> Option<String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_npm_index_lookup() {
        let dir = TempDir::new().unwrap();
        let bucket = dir.path().join("_cacache/index-v5/ab/cd");
        fs::create_dir_all(&bucket).unwrap();
        fs::write(
            bucket.join("abcdef"),
            "\n0123abcd\t{\"key\":\"make-fetch-happen:request-cache:https://registry.npmjs.org/@ctrl/tinycolor/-/tinycolor-4.1.1.tgz\",\"integrity\":\"sha512-x\"}\n",
        )
        .unwrap();

        assert_eq!(
            resolve("@ctrl/tinycolor", PackageManagerKind::Npm, dir.path()).as_deref(),
            Some("4.1.1")
        );
        assert_eq!(resolve("tinycolor", PackageManagerKind::Npm, dir.path()), None);
    }

    #[test]
    fn test_yarn_classic_entry() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("v6/npm-left-pad-1.3.0-5b8a3a7765dfe001261dde915589e782f8c94d1e-integrity");
        let installed = entry.join("node_modules/left-pad");
        fs::create_dir_all(&installed).unwrap();
        fs::write(installed.join("package.json"), r#"{"name":"left-pad","version":"1.3.0"}"#).unwrap();
        fs::create_dir_all(dir.path().join("v6/npm-left-pad-extra-2.0.0-abc-integrity")).unwrap();

        assert_eq!(
            resolve("left-pad", PackageManagerKind::Yarn, dir.path()).as_deref(),
            Some("1.3.0")
        );
    }

    #[test]
    fn test_yarn_berry_zip() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("@ctrl-tinycolor-npm-4.1.2-0a1b2c3d4e-5f.zip"), b"PK").unwrap();

        assert_eq!(
            resolve("@ctrl/tinycolor", PackageManagerKind::Yarn, dir.path()).as_deref(),
            Some("4.1.2")
        );
    }

    #[test]
    fn test_yarn_prerelease_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("next-npm-14.3.0-canary.77-0a1b2c3d4e-5f.zip"), b"PK").unwrap();
        fs::create_dir_all(
            dir.path()
                .join("v6/npm-nx-21.5.0-beta.1-5b8a3a7765dfe001261dde915589e782f8c94d1e-integrity"),
        )
        .unwrap();

        assert_eq!(
            resolve("next", PackageManagerKind::Yarn, dir.path()).as_deref(),
            Some("14.3.0-canary.77")
        );
        assert_eq!(
            resolve("nx", PackageManagerKind::Yarn, dir.path()).as_deref(),
            Some("21.5.0-beta.1")
        );
    }

    #[test]
    fn test_entry_version() {
        assert_eq!(entry_version("1.3.0-5b8a3a77-integrity").as_deref(), Some("1.3.0"));
        assert_eq!(entry_version("4.1.2-0a1b2c3d4e-5f").as_deref(), Some("4.1.2"));
        assert_eq!(entry_version("extra-2.0.0-abc-integrity"), None);
        assert_eq!(entry_version("1.3.0"), None);
    }

    #[test]
    fn test_pnpm_store_index_scan() {
        let dir = TempDir::new().unwrap();
        let files = dir.path().join("v3/files/1f");
        fs::create_dir_all(&files).unwrap();
        fs::write(
            files.join("deadbeef-index.json"),
            r#"{"name":"chalk","version":"5.6.1","files":{}}"#,
        )
        .unwrap();
        fs::write(files.join("cafe-index.json"), r#"{"name":"debug","version":"4.4.2"}"#).unwrap();

        assert_eq!(
            resolve("chalk", PackageManagerKind::Pnpm, dir.path()).as_deref(),
            Some("5.6.1")
        );
        assert_eq!(resolve("left-pad", PackageManagerKind::Pnpm, dir.path()), None);
    }

    #[test]
    fn test_scan_depth_is_bounded() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a/b/c/d/e/f/g");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("package.json"), r#"{"name":"deep","version":"1.0.0"}"#).unwrap();

        assert_eq!(resolve("deep", PackageManagerKind::Pnpm, dir.path()), None);
    }

    #[test]
    fn test_tarball_version() {
        let marker = "/left-pad/-/left-pad-";
        assert_eq!(
            tarball_version(
                "https://registry.npmjs.org/left-pad/-/left-pad-1.3.0.tgz",
                "left-pad",
                marker
            )
            .as_deref(),
            Some("1.3.0")
        );
        assert_eq!(
            tarball_version("https://registry.npmjs.org/left-pad", "left-pad", marker),
            None
        );
    }

    #[tokio::test]
    async fn test_locate_uses_reported_path() {
        let dir = TempDir::new().unwrap();
        let reported = format!("npm warn config something\n{}\n", dir.path().display());
        let probe = FixedProbe(Some(reported));

        assert_eq!(
            locate(PackageManagerKind::Npm, &probe).await,
            Some(dir.path().to_path_buf())
        );
    }

    #[tokio::test]
    async fn test_locate_unknown_kind() {
        let probe = FixedProbe(Some("/tmp".to_string()));
        assert_eq!(locate(PackageManagerKind::Unknown, &probe).await, None);
    }

    #[tokio::test]
    async fn test_lookup_with_reported_root() {
        let dir = TempDir::new().unwrap();
        let files = dir.path().join("files/00");
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("x-index.json"), r#"{"name":"nx","version":"21.5.0"}"#).unwrap();

        let probe = Arc::new(FixedProbe(Some(dir.path().display().to_string())));
        let cache = GlobalCache::new(probe);
        assert_eq!(
            cache.lookup("nx", PackageManagerKind::Pnpm).await.as_deref(),
            Some("21.5.0")
        );
    }
}
