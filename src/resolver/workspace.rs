//! Monorepo member discovery.
//!
//! Members come from, in order:
//!
//! 1. the root manifest's `workspaces` (array, or `{ "packages": [...] }`)
//! 2. `pnpm-workspace.yaml` `packages` entries
//! 3. when neither yields a member, every `package.json` found up to four
//!    levels below the root (at most 50)
//!
//! Unreadable manifests and malformed patterns are skipped.

use crate::pattern::glob_match;
use crate::resolver::detect::MANIFEST;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Maximum member depth for declared workspace patterns.
const PATTERN_DEPTH: usize = 3;
/// Maximum manifest depth for undeclared discovery.
const DISCOVERY_DEPTH: usize = 4;
/// Maximum number of manifests collected by undeclared discovery.
const DISCOVERY_LIMIT: usize = 50;

/// Dependency-install and version-control directories never walked into.
const SKIP_DIRS: &[&str] = &["node_modules", ".git", ".hg", ".svn", ".pnpm-store", ".yarn"];

#[derive(Deserialize)]
struct RootManifest {
    workspaces: Option<WorkspacesField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl WorkspacesField {
    fn into_patterns(self) -> Vec<String> {
        match self {
            WorkspacesField::List(patterns) => patterns,
            WorkspacesField::Object { packages } => packages,
        }
    }
}

#[derive(Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

/// Ordered, de-duplicated member set. The root is always first.
struct Members {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Members {
    fn new(root: PathBuf) -> Self {
        let mut members = Self {
            paths: Vec::new(),
            seen: HashSet::new(),
        };
        members.insert(root);
        members
    }

    fn insert(&mut self, path: PathBuf) -> bool {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
            true
        } else {
            false
        }
    }

    fn len(&self) -> usize {
        self.paths.len()
    }
}

/// Enumerates the workspace member directories of `root`, root first.
pub fn enumerate(root: &Path) -> Vec<PathBuf> {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    let mut members = Members::new(root.clone());

    let declared = [manifest_patterns(&root), pnpm_patterns(&root)];
    for patterns in &declared {
        for member in resolve_patterns(&root, patterns) {
            members.insert(member);
        }
    }

    if members.len() == 1 {
        for member in discover_manifests(&root) {
            members.insert(member);
        }
    }

    debug!(root = %root.display(), members = members.len(), "workspace members enumerated");
    members.paths
}

fn manifest_patterns(root: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(root.join(MANIFEST)) else {
        return Vec::new();
    };
    serde_json::from_str::<RootManifest>(&content)
        .ok()
        .and_then(|manifest| manifest.workspaces)
        .map(WorkspacesField::into_patterns)
        .unwrap_or_default()
}

fn pnpm_patterns(root: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(root.join("pnpm-workspace.yaml")) else {
        return Vec::new();
    };

    match serde_yaml::from_str::<PnpmWorkspace>(&content) {
        Ok(workspace) => workspace.packages,
        Err(e) => {
            debug!(error = %e, "pnpm-workspace.yaml is not valid YAML, reading list entries");
            content
                .lines()
                .filter_map(|line| line.trim().strip_prefix('-'))
                .map(|entry| entry.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                .filter(|entry| !entry.is_empty())
                .collect()
        }
    }
}

/// Expands include patterns, drops `!`-excluded matches and keeps only
/// directories that have their own manifest.
fn resolve_patterns(root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let excluded: HashSet<PathBuf> = patterns
        .iter()
        .filter_map(|p| p.trim().strip_prefix('!'))
        .flat_map(|p| expand(root, p))
        .collect();

    patterns
        .iter()
        .filter(|p| !p.trim().starts_with('!'))
        .flat_map(|p| expand(root, p))
        .filter(|dir| !excluded.contains(dir))
        .filter(|dir| dir.join(MANIFEST).is_file())
        .collect()
}

/// Expands one pattern against the filesystem, depth-bounded and sorted.
fn expand(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let segments: Vec<&str> = pattern
        .trim()
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "..") {
        return Vec::new();
    }

    let mut current = vec![root.to_path_buf()];
    for segment in segments {
        let mut next = Vec::new();
        for dir in &current {
            let depth = depth_below(root, dir);
            if depth >= PATTERN_DEPTH && segment != "**" {
                continue;
            }
            if segment == "**" {
                next.extend(descendants(dir, PATTERN_DEPTH.saturating_sub(depth)));
            } else if segment.contains('*') {
                next.extend(
                    child_dirs(dir)
                        .into_iter()
                        .filter(|child| file_name(child).is_some_and(|n| glob_match(segment, n))),
                );
            } else {
                let child = dir.join(segment);
                if child.is_dir() {
                    next.push(child);
                }
            }
        }
        current = next;
    }

    current.sort();
    current.dedup();
    current
}

fn depth_below(root: &Path, dir: &Path) -> usize {
    dir.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| file_name(path).is_some_and(|n| !SKIP_DIRS.contains(&n)))
        .collect();
    dirs.sort();
    dirs
}

/// `dir` itself and every directory up to `max_depth` levels below it.
fn descendants(dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Parents of every manifest below `root`, excluding the root's own.
fn discover_manifests(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(DISCOVERY_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST)
        .take(DISCOVERY_LIMIT)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect()
}
