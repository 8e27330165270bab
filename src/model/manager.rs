use serde::{Deserialize, Serialize};

/// The dependency manager governing a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
    Unknown,
}

impl PackageManagerKind {
    /// Kinds with a lockfile, in the order lockfiles are probed.
    pub const KNOWN: [PackageManagerKind; 3] = [
        PackageManagerKind::Pnpm,
        PackageManagerKind::Yarn,
        PackageManagerKind::Npm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
            PackageManagerKind::Unknown => "unknown",
        }
    }

    /// Maps the name half of a manifest `packageManager` field.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "npm" => PackageManagerKind::Npm,
            "yarn" => PackageManagerKind::Yarn,
            "pnpm" => PackageManagerKind::Pnpm,
            _ => PackageManagerKind::Unknown,
        }
    }

    /// File name of this manager's lockfile.
    pub fn lockfile_name(&self) -> Option<&'static str> {
        match self {
            PackageManagerKind::Npm => Some("package-lock.json"),
            PackageManagerKind::Yarn => Some("yarn.lock"),
            PackageManagerKind::Pnpm => Some("pnpm-lock.yaml"),
            PackageManagerKind::Unknown => None,
        }
    }

    /// Name of the manager's executable, with the `.cmd` shim on Windows.
    pub fn executable(&self) -> Option<&'static str> {
        let windows = cfg!(target_os = "windows");
        match self {
            PackageManagerKind::Npm => Some(if windows { "npm.cmd" } else { "npm" }),
            PackageManagerKind::Yarn => Some(if windows { "yarn.cmd" } else { "yarn" }),
            PackageManagerKind::Pnpm => Some(if windows { "pnpm.cmd" } else { "pnpm" }),
            PackageManagerKind::Unknown => None,
        }
    }
}

impl std::fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }
}
