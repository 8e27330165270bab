use crate::model::{PackageManagerKind, ResolvedVersion, VersionSource};
use crate::resolver::{detect, local, lockfile, workspace};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manager kind and workspace members of one scan root, computed once and
/// shared by every threat.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub kind: PackageManagerKind,
    /// Member directories other than the root, in enumeration order.
    pub workspaces: Vec<PathBuf>,
}

impl ProjectContext {
    pub fn new(root: &Path) -> Self {
        let mut members = workspace::enumerate(root).into_iter();
        let root = members.next().unwrap_or_else(|| root.to_path_buf());
        let kind = detect(&root);
        let workspaces: Vec<PathBuf> = members.collect();

        debug!(
            root = %root.display(),
            %kind,
            workspaces = workspaces.len(),
            "project context"
        );
        Self {
            root,
            kind,
            workspaces,
        }
    }

    /// Resolves `package` from project-local sources.
    ///
    /// Order is fixed: root lockfile, workspace lockfiles, root install,
    /// workspace installs. The first hit wins.
    pub fn resolve_local(&self, package: &str) -> ResolvedVersion {
        if let Some(version) = lockfile::resolve_in_dir(&self.root, package, self.kind) {
            return ResolvedVersion::found(version, VersionSource::RootLock);
        }

        for member in &self.workspaces {
            if let Some(version) = lockfile::resolve_in_dir(member, package, self.kind) {
                return ResolvedVersion::found(version, VersionSource::WorkspaceLock);
            }
        }

        if let Some(version) = local::extract(package, &self.root) {
            return ResolvedVersion::found(version, VersionSource::RootInstall);
        }

        for member in &self.workspaces {
            if let Some(version) = local::extract(package, member) {
                return ResolvedVersion::found(version, VersionSource::WorkspaceInstall);
            }
        }

        ResolvedVersion::none()
    }
}
