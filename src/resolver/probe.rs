//! Read-only queries to external executables.
//!
//! Every query is bounded by a timeout. A missing executable, a non-zero exit
//! status, a timeout or unreadable output all mean "no information".

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for a single executable query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs an executable and returns its trimmed standard output.
#[async_trait]
pub trait CommandProbe: Send + Sync {
    /// Returns `None` on any failure.
    async fn output(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// Probe backed by real child processes.
pub struct SystemProbe {
    timeout: Duration,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandProbe for SystemProbe {
    async fn output(&self, program: &str, args: &[&str]) -> Option<String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(program, error = %e, "executable not available");
                return None;
            }
            Err(_) => {
                debug!(program, timeout_ms = self.timeout.as_millis() as u64, "executable timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(program, status = %output.status, "executable exited with failure");
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            None
        } else {
            Some(stdout)
        }
    }
}

/// Extracts the first version-looking token (`1.2.3` or `v1.2.3`) from
/// free-form `--version` output.
pub fn parse_version_output(output: &str) -> Option<String> {
    output
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .map(|token| token.trim_start_matches(['v', 'V']))
        .find(|token| {
            token.starts_with(|c: char| c.is_ascii_digit()) && token.contains('.')
        })
        .map(|token| token.trim_end_matches(['.', ':', ';']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        assert_eq!(parse_version_output("v20.11.1").as_deref(), Some("20.11.1"));
        assert_eq!(parse_version_output("10.2.4\n").as_deref(), Some("10.2.4"));
        assert_eq!(
            parse_version_output("deno 1.40.2 (release, x86_64-unknown-linux-gnu)\nv8 12.1").as_deref(),
            Some("1.40.2")
        );
        assert_eq!(parse_version_output("no version here"), None);
        assert_eq!(parse_version_output(""), None);
    }

    #[tokio::test]
    async fn test_missing_executable_is_none() {
        let probe = SystemProbe::with_timeout(Duration::from_secs(2));
        let out = probe
            .output("threatscan-definitely-not-an-executable", &["--version"])
            .await;
        assert!(out.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_executable_times_out() {
        let probe = SystemProbe::with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let out = probe.output("sleep", &["5"]).await;

        assert!(out.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_exit_is_none() {
        let probe = SystemProbe::with_timeout(Duration::from_secs(2));
        assert!(probe.output("false", &[]).await.is_none());
        // Output on stdout does not count when the exit status is a failure.
        assert!(probe
            .output("sh", &["-c", "echo 1.2.3; exit 3"])
            .await
            .is_none());
        assert_eq!(
            probe.output("sh", &["-c", "echo 1.2.3"]).await.as_deref(),
            Some("1.2.3")
        );
    }
}
