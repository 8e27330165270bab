//! pnpm-lock.yaml reader
//!
//! Package keys differ between lockfile generations:
//!
//! ```yaml
//! packages:
//!   /left-pad/1.3.0:                # v5
//!   /@ctrl/tinycolor/4.1.1:         # v5, scoped
//!   /react-dom/18.2.0_react@18.2.0: # v5, peer suffix
//!   /left-pad@1.3.0:                # v6
//!   left-pad@1.3.0:                 # v9
//!   react-dom@18.2.0(react@18.2.0): # v9 snapshots, peer suffix
//! ```
//!
//! The file is read as YAML first. If it does not parse, the key lines are
//! scanned directly.

use super::{unquote, LockfileReader};
use serde_yaml::{Mapping, Value};

pub struct PnpmLockReader;

impl LockfileReader for PnpmLockReader {
    fn file_name(&self) -> &'static str {
        "pnpm-lock.yaml"
    }

    fn extract_from_str(&self, package: &str, content: &str) -> Option<String> {
        match serde_yaml::from_str::<Value>(content) {
            Ok(doc) => from_document(&doc, package),
            Err(_) => from_key_lines(content, package),
        }
    }
}

fn from_document(doc: &Value, package: &str) -> Option<String> {
    for section in ["packages", "snapshots"] {
        let Some(map) = doc.get(section).and_then(Value::as_mapping) else {
            continue;
        };
        if let Some(version) = map
            .keys()
            .filter_map(Value::as_str)
            .find_map(|key| version_from_key(key, package))
        {
            return Some(version);
        }
    }

    // The root project's direct dependencies, v6+ under `importers."."`,
    // v5 single-project lockfiles at the top level.
    let root = doc
        .get("importers")
        .and_then(|importers| importers.get("."))
        .and_then(Value::as_mapping)
        .or_else(|| doc.as_mapping())?;
    from_importer(root, package)
}

fn from_importer(importer: &Mapping, package: &str) -> Option<String> {
    ["dependencies", "devDependencies", "optionalDependencies"]
        .into_iter()
        .filter_map(|section| importer.get(section))
        .filter_map(|deps| deps.get(package))
        .find_map(|entry| {
            let raw = match entry {
                Value::String(s) => s.as_str(),
                Value::Mapping(_) => entry.get("version").and_then(Value::as_str)?,
                _ => return None,
            };
            clean_version(raw)
        })
}

fn from_key_lines(content: &str, package: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_suffix(':'))
        .find_map(|key| version_from_key(key, package))
}

/// Returns the version in a package key if the key names `package`.
fn version_from_key(key: &str, package: &str) -> Option<String> {
    let key = unquote(key);
    let key = key.strip_prefix('/').unwrap_or(key);
    let rest = key.strip_prefix(package)?;
    let rest = rest.strip_prefix('@').or_else(|| rest.strip_prefix('/'))?;
    clean_version(rest)
}

/// Removes peer-dependency suffixes and rejects non-version references
/// such as `link:../pkg`.
fn clean_version(raw: &str) -> Option<String> {
    let end = raw.find(['(', '_']).unwrap_or(raw.len());
    let version = raw[..end].trim().trim_end_matches('/');
    if version.starts_with(|c: char| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK_V5: &str = r#"lockfileVersion: 5.4

specifiers:
  left-pad: ^1.3.0

dependencies:
  left-pad: 1.3.0

packages:

  /left-pad/1.3.0:
    resolution: {integrity: sha512-abc}
    dev: false

  /@ctrl/tinycolor/4.1.1:
    resolution: {integrity: sha512-def}

  /react-dom/18.2.0_react@18.2.0:
    resolution: {integrity: sha512-ghi}
"#;

    const LOCK_V6: &str = r#"lockfileVersion: '6.0'

importers:
  .:
    dependencies:
      left-pad:
        specifier: ^1.3.0
        version: 1.3.0

packages:

  /left-pad@1.3.0:
    resolution: {integrity: sha512-abc}

  /@ctrl/tinycolor@4.1.1:
    resolution: {integrity: sha512-def}
"#;

    const LOCK_V9: &str = r#"lockfileVersion: '9.0'

importers:
  .:
    dependencies:
      react-dom:
        specifier: ^18.2.0
        version: 18.2.0(react@18.2.0)
      local-lib:
        specifier: link:../local-lib
        version: link:../local-lib

packages:
  left-pad@1.3.0:
    resolution: {integrity: sha512-abc}
  '@ctrl/tinycolor@4.1.1':
    resolution: {integrity: sha512-def}

snapshots:
  react-dom@18.2.0(react@18.2.0):
    dependencies:
      react: 18.2.0
"#;

    #[test]
    fn test_v5_keys() {
        assert_eq!(
            PnpmLockReader.extract_from_str("left-pad", LOCK_V5).as_deref(),
            Some("1.3.0")
        );
        assert_eq!(
            PnpmLockReader.extract_from_str("@ctrl/tinycolor", LOCK_V5).as_deref(),
            Some("4.1.1")
        );
        assert_eq!(
            PnpmLockReader.extract_from_str("react-dom", LOCK_V5).as_deref(),
            Some("18.2.0")
        );
    }

    #[test]
    fn test_v6_keys() {
        assert_eq!(
            PnpmLockReader.extract_from_str("left-pad", LOCK_V6).as_deref(),
            Some("1.3.0")
        );
        assert_eq!(
            PnpmLockReader.extract_from_str("@ctrl/tinycolor", LOCK_V6).as_deref(),
            Some("4.1.1")
        );
    }

    #[test]
    fn test_v9_packages_and_snapshots() {
        assert_eq!(
            PnpmLockReader.extract_from_str("@ctrl/tinycolor", LOCK_V9).as_deref(),
            Some("4.1.1")
        );
        assert_eq!(
            PnpmLockReader.extract_from_str("react-dom", LOCK_V9).as_deref(),
            Some("18.2.0")
        );
    }

    #[test]
    fn test_importer_link_is_not_a_version() {
        assert_eq!(PnpmLockReader.extract_from_str("local-lib", LOCK_V9), None);
    }

    #[test]
    fn test_importer_fallback() {
        let lock = "lockfileVersion: '6.0'\nimporters:\n  .:\n    devDependencies:\n      typescript:\n        specifier: ^5.0.0\n        version: 5.4.5\n";
        assert_eq!(
            PnpmLockReader.extract_from_str("typescript", lock).as_deref(),
            Some("5.4.5")
        );
    }

    #[test]
    fn test_prefix_names_do_not_match() {
        assert_eq!(PnpmLockReader.extract_from_str("left", LOCK_V6), None);
        assert_eq!(PnpmLockReader.extract_from_str("react", LOCK_V5), None);
    }

    #[test]
    fn test_key_line_fallback_on_invalid_yaml() {
        let broken = "packages:\n  /left-pad/1.3.0:\n    resolution: {integrity: [unclosed\n";
        assert_eq!(
            PnpmLockReader.extract_from_str("left-pad", broken).as_deref(),
            Some("1.3.0")
        );
    }

    #[test]
    fn test_not_found() {
        assert_eq!(PnpmLockReader.extract_from_str("right-pad", LOCK_V9), None);
        assert_eq!(PnpmLockReader.extract_from_str("left-pad", ""), None);
    }
}
