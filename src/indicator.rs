//! File, directory, content and process indicators.
//!
//! These run next to version classification and feed the same threat
//! verdict: any hit triggers the threat.

use crate::model::{IndicatorFinding, IndicatorKind, Indicators};
use crate::pattern::matches_any;
use crate::resolver::CommandProbe;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Maximum directory depth walked below a scan root.
pub const MAX_DEPTH: usize = 8;
/// Files larger than this are not searched for string markers.
pub const MAX_CONTENT_BYTES: u64 = 5 * 1024 * 1024;

/// Walks `root` for file, directory and string indicators.
pub fn scan_tree(root: &Path, indicators: &Indicators) -> Vec<IndicatorFinding> {
    let mut findings = Vec::new();
    if indicators.files.is_empty() && indicators.directories.is_empty() && indicators.strings.is_empty() {
        return findings;
    }

    let walker = WalkDir::new(root)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker.filter_map(Result::ok) {
        if entry.depth() == 0 {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let location = entry.path().display().to_string();

        if entry.file_type().is_dir() {
            if matches_any(&indicators.directories, name) {
                findings.push(finding(IndicatorKind::Directory, name, location));
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        if matches_any(&indicators.files, name) {
            findings.push(finding(IndicatorKind::File, name, location.clone()));
        }
        if let Some(marker) = content_marker(entry.path(), &indicators.strings) {
            findings.push(finding(IndicatorKind::String, marker, location));
        }
    }

    debug!(root = %root.display(), findings = findings.len(), "indicator walk finished");
    findings
}

/// First marker contained in the file, if the file is small enough to read.
fn content_marker<'a>(path: &Path, markers: &'a [String]) -> Option<&'a str> {
    if markers.is_empty() {
        return None;
    }
    let size = fs::metadata(path).ok()?.len();
    if size > MAX_CONTENT_BYTES {
        return None;
    }
    let bytes = fs::read(path).ok()?;
    let content = String::from_utf8_lossy(&bytes);
    markers
        .iter()
        .map(String::as_str)
        .filter(|marker| !marker.is_empty())
        .find(|marker| content.contains(marker))
}

/// Matches running process names against the process indicators.
pub async fn scan_processes(probe: &dyn CommandProbe, indicators: &Indicators) -> Vec<IndicatorFinding> {
    if indicators.processes.is_empty() {
        return Vec::new();
    }

    let listing = if cfg!(target_os = "windows") {
        probe.output("tasklist", &["/fo", "csv", "/nh"]).await
    } else {
        probe.output("ps", &["-A", "-o", "comm="]).await
    };
    let Some(listing) = listing else {
        debug!("process listing unavailable");
        return Vec::new();
    };

    let running = process_names(&listing);
    indicators
        .processes
        .iter()
        .filter_map(|marker| {
            running
                .iter()
                .find(|name| process_matches(marker, name))
                .map(|name| finding(IndicatorKind::Process, marker, name.clone()))
        })
        .collect()
}

/// Base names from `ps -o comm=` lines or `tasklist` CSV rows.
fn process_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let command = if line.starts_with('"') {
                line.split(',').next().unwrap_or(line).trim_matches('"')
            } else {
                line
            };
            command
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(command)
                .to_string()
        })
        .collect()
}

fn process_matches(marker: &str, name: &str) -> bool {
    let stem = name
        .len()
        .checked_sub(4)
        .filter(|cut| name.get(*cut..).is_some_and(|ext| ext.eq_ignore_ascii_case(".exe")))
        .and_then(|cut| name.get(..cut))
        .unwrap_or(name);
    marker.eq_ignore_ascii_case(name) || marker.eq_ignore_ascii_case(stem)
}

fn finding(kind: IndicatorKind, indicator: &str, location: String) -> IndicatorFinding {
    IndicatorFinding {
        kind,
        indicator: indicator.to_string(),
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Listing(&'static str);

    #[async_trait]
    impl CommandProbe for Listing {
        async fn output(&self, _program: &str, _args: &[&str]) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl CommandProbe for Unavailable {
        async fn output(&self, _program: &str, _args: &[&str]) -> Option<String> {
            None
        }
    }

    fn indicators() -> Indicators {
        Indicators {
            files: vec!["bundle.js".to_string(), "*-workflow.yml".to_string()],
            directories: vec!["shai-hulud*".to_string()],
            strings: vec!["webhook.site/bb8ca5f6".to_string()],
            processes: vec!["trufflehog".to_string()],
        }
    }

    #[test]
    fn test_scan_tree_finds_files_dirs_and_strings() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/@ctrl/tinycolor")).unwrap();
        fs::write(root.join("node_modules/@ctrl/tinycolor/bundle.js"), "// payload").unwrap();
        fs::create_dir_all(root.join(".github/workflows")).unwrap();
        fs::write(
            root.join(".github/workflows/shai-hulud-workflow.yml"),
            "run: curl https://webhook.site/bb8ca5f6-4175",
        )
        .unwrap();
        fs::create_dir_all(root.join("shai-hulud-migration")).unwrap();

        let findings = scan_tree(root, &indicators());
        let kinds: Vec<IndicatorKind> = findings.iter().map(|f| f.kind).collect();

        assert!(kinds.contains(&IndicatorKind::File));
        assert!(kinds.contains(&IndicatorKind::Directory));
        assert!(kinds.contains(&IndicatorKind::String));
        assert_eq!(
            findings.iter().filter(|f| f.kind == IndicatorKind::File).count(),
            2
        );
    }

    #[test]
    fn test_scan_tree_skips_git_and_clean_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/bundle.js"), "").unwrap();
        fs::write(dir.path().join("index.js"), "console.log('hi')").unwrap();

        assert!(scan_tree(dir.path(), &indicators()).is_empty());
        assert!(scan_tree(dir.path(), &Indicators::default()).is_empty());
    }

    #[test]
    fn test_process_names() {
        let ps = "/usr/sbin/sshd\n  bash\n/opt/bin/trufflehog\n";
        assert_eq!(process_names(ps), vec!["sshd", "bash", "trufflehog"]);

        let tasklist = "\"svchost.exe\",\"1044\",\"Services\",\"0\",\"8,420 K\"\n";
        assert_eq!(process_names(tasklist), vec!["svchost.exe"]);
    }

    #[test]
    fn test_process_matches() {
        assert!(process_matches("trufflehog", "TruffleHog"));
        assert!(process_matches("trufflehog", "trufflehog.exe"));
        assert!(!process_matches("trufflehog", "truffle"));
    }

    #[tokio::test]
    async fn test_scan_processes() {
        let findings = scan_processes(&Listing("bash\n/usr/local/bin/trufflehog\n"), &indicators()).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, IndicatorKind::Process);
        assert_eq!(findings[0].location, "trufflehog");

        assert!(scan_processes(&Unavailable, &indicators()).await.is_empty());
        assert!(scan_processes(&Listing("bash\n"), &indicators()).await.is_empty());
    }
}
