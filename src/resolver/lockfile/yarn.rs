//! yarn.lock reader
//!
//! yarn.lock is a sequence of blocks. Each block starts with an unindented
//! header listing one or more descriptors and ending in `:`; indented lines
//! below it hold the fields.
//!
//! ```text
//! # classic (v1)
//! "@babel/core@^7.0.0", "@babel/core@^7.1.0":
//!   version "7.1.0"
//!
//! # Berry (v2+)
//! "lodash@npm:^4.17.21":
//!   version: 4.17.21
//! ```

use super::{unquote, LockfileReader};

/// Fields further than this below a header are not read.
const MAX_BLOCK_LINES: usize = 10;

pub struct YarnLockReader;

/// One parsed block of a yarn.lock.
#[derive(Debug, Default, PartialEq, Eq)]
struct YarnEntry {
    names: Vec<String>,
    version: Option<String>,
}

impl LockfileReader for YarnLockReader {
    fn file_name(&self) -> &'static str {
        "yarn.lock"
    }

    fn extract_from_str(&self, package: &str, content: &str) -> Option<String> {
        let entries = parse_entries(content);

        if let Some(version) = find_version(&entries, package) {
            return Some(version);
        }

        // Some lockfiles record a scoped package by its bare name.
        let (scope, bare) = package.split_once('/')?;
        if !scope.starts_with('@') || bare.is_empty() {
            return None;
        }
        find_version(&entries, bare)
    }
}

fn find_version(entries: &[YarnEntry], package: &str) -> Option<String> {
    entries
        .iter()
        .filter(|entry| entry.names.iter().any(|name| name == package))
        .find_map(|entry| entry.version.clone())
}

fn parse_entries(content: &str) -> Vec<YarnEntry> {
    let mut entries = Vec::new();
    let mut current: Option<YarnEntry> = None;
    let mut body_lines = 0;
    let mut field_indent: Option<usize> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        if indent == 0 {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            if let Some(header) = trimmed.strip_suffix(':') {
                current = Some(YarnEntry {
                    names: header_names(header),
                    version: None,
                });
                body_lines = 0;
                field_indent = None;
            }
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        body_lines += 1;
        if body_lines > MAX_BLOCK_LINES || entry.version.is_some() {
            continue;
        }

        // Only fields at the block's own indentation; deeper lines belong
        // to nested maps such as `dependencies`.
        let level = *field_indent.get_or_insert(indent);
        if indent != level {
            continue;
        }
        if let Some(version) = version_field(trimmed) {
            entry.version = Some(version);
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }

    entries
}

/// Package names from a header such as `"a@^1", a@~1.2, "@s/b@npm:^2"`.
fn header_names(header: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for descriptor in header.split(',') {
        let descriptor = unquote(descriptor);
        if descriptor.is_empty() {
            continue;
        }
        let name = descriptor_name(descriptor).to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// The name part of `name@range`, keeping a leading scope `@`.
fn descriptor_name(descriptor: &str) -> &str {
    match descriptor
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '@')
    {
        Some((pos, _)) => &descriptor[..pos],
        None => descriptor,
    }
}

/// Parses `version "1.2.3"` (classic) or `version: 1.2.3` (Berry).
fn version_field(line: &str) -> Option<String> {
    let rest = line.strip_prefix("version")?;
    if !rest.starts_with([' ', ':', '\t']) {
        return None;
    }
    let value = unquote(rest.trim_start_matches([' ', '\t']).trim_start_matches(':'));
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/core@^7.0.0", "@babel/core@^7.1.0":
  version "7.1.0"
  resolved "https://registry.yarnpkg.com/@babel/core/-/core-7.1.0.tgz"
  dependencies:
    debug "^4.1.0"

chalk@^4.1.0:
  version "4.1.2"
  resolved "https://registry.yarnpkg.com/chalk/-/chalk-4.1.2.tgz"

debug@^4.1.0, debug@^4.3.4:
  version "4.3.4"
"#;

    const BERRY: &str = r#"__metadata:
  version: 6
  cacheKey: 8

"@ctrl/tinycolor@npm:^4.1.0":
  version: 4.1.1
  resolution: "@ctrl/tinycolor@npm:4.1.1"
  languageName: node
  linkType: hard

"lodash@npm:^4.17.21":
  version: 4.17.21
  resolution: "lodash@npm:4.17.21"
"#;

    #[test]
    fn test_classic_lookup() {
        assert_eq!(
            YarnLockReader.extract_from_str("chalk", CLASSIC).as_deref(),
            Some("4.1.2")
        );
        assert_eq!(
            YarnLockReader.extract_from_str("debug", CLASSIC).as_deref(),
            Some("4.3.4")
        );
        assert_eq!(
            YarnLockReader.extract_from_str("@babel/core", CLASSIC).as_deref(),
            Some("7.1.0")
        );
    }

    #[test]
    fn test_nested_dependency_is_not_a_header() {
        // `debug "^4.1.0"` inside @babel/core's block must not resolve debug.
        let lock = "\"@babel/core@^7.0.0\":\n  version \"7.1.0\"\n  dependencies:\n    debug \"^4.1.0\"\n";
        assert_eq!(YarnLockReader.extract_from_str("debug", lock), None);
    }

    #[test]
    fn test_berry_lookup() {
        assert_eq!(
            YarnLockReader.extract_from_str("lodash", BERRY).as_deref(),
            Some("4.17.21")
        );
        assert_eq!(
            YarnLockReader.extract_from_str("@ctrl/tinycolor", BERRY).as_deref(),
            Some("4.1.1")
        );
        assert_eq!(YarnLockReader.extract_from_str("tinycolor", BERRY), None);
    }

    #[test]
    fn test_exact_name_match_only() {
        let lock = "lodash.merge@^4.6.2:\n  version \"4.6.2\"\n";
        assert_eq!(YarnLockReader.extract_from_str("lodash", lock), None);
    }

    #[test]
    fn test_scoped_retry_with_bare_name() {
        let lock = "tinycolor@^4.1.0:\n  version \"4.1.0\"\n";
        assert_eq!(
            YarnLockReader.extract_from_str("@ctrl/tinycolor", lock).as_deref(),
            Some("4.1.0")
        );
    }

    #[test]
    fn test_version_beyond_block_window() {
        let mut lock = String::from("late@^1.0.0:\n");
        for i in 0..MAX_BLOCK_LINES {
            lock.push_str(&format!("  field{} \"x\"\n", i));
        }
        lock.push_str("  version \"1.0.0\"\n");
        assert_eq!(YarnLockReader.extract_from_str("late", &lock), None);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(YarnLockReader.extract_from_str("chalk", ""), None);
        assert_eq!(YarnLockReader.extract_from_str("chalk", "  version \"1.0.0\"\n"), None);
        assert_eq!(YarnLockReader.extract_from_str("chalk", "chalk@^1:\n  version \"\"\n"), None);
    }

    #[test]
    fn test_descriptor_name() {
        assert_eq!(descriptor_name("lodash@^4.17.21"), "lodash");
        assert_eq!(descriptor_name("@babel/core@^7.0.0"), "@babel/core");
        assert_eq!(descriptor_name("@scope/pkg@npm:1.0.0"), "@scope/pkg");
        assert_eq!(descriptor_name("bare"), "bare");
        assert_eq!(descriptor_name("é@^1"), "é");
    }

    #[test]
    fn test_header_names_dedup() {
        assert_eq!(
            header_names("\"debug@^4.1.0\", \"debug@^4.3.4\""),
            vec!["debug".to_string()]
        );
    }
}
