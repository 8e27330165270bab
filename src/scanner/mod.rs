//! Scan orchestration.
//!
//! [`ScanOrchestrator`] runs every threat definition against every scan root:
//!
//! 1. Each root's manager kind and workspace members are computed once
//!    ([`ProjectContext`]).
//! 2. Each ruled package is resolved through the fixed chain: root lockfile,
//!    workspace lockfiles, root install, workspace installs, then the global
//!    cache when the gate is open.
//! 3. Each ruled tool is resolved once per run from `<tool> --version`.
//! 4. Versions are classified, indicators are checked and the threat
//!    triggers when anything is vulnerable or any indicator hits.
//!
//! The global cache gate opens when the run flag, the threat's own
//! `check_global_cache` or verbose mode is set.
//!
//! # Example
//!
//! ```no_run
//! use threatscan::scanner::{ScanOptions, ScanOrchestrator};
//! use threatscan::threats::load_threats;
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let loaded = load_threats(Path::new("threats"))?;
//!     let orchestrator = ScanOrchestrator::new(ScanOptions::default());
//!     let report = orchestrator.scan(&loaded.threats, &[PathBuf::from(".")]).await;
//!     println!("{} threat(s) triggered", report.triggered().count());
//!     Ok(())
//! }
//! ```

mod context;

pub use context::ProjectContext;

use crate::checker::classify;
use crate::indicator;
use crate::model::{
    ClassificationResult, ClassificationStatus, PackageManagerKind, ResolvedVersion, ScanReport,
    SubjectKind, ThreatDefinition, ThreatOutcome, VersionRule, VersionSource,
};
use crate::pattern::matches_any;
use crate::resolver::probe::{parse_version_output, DEFAULT_TIMEOUT};
use crate::resolver::{CommandProbe, GlobalCache, GlobalCacheLookup, SystemProbe};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Consult global caches for every threat.
    pub check_global_cache: bool,
    /// Verbose runs also open the global cache gate.
    pub verbose: bool,
    /// Scan threats concurrently.
    pub parallel: bool,
    /// Timeout for each external executable query.
    pub command_timeout: Duration,
    /// Package names or `*` globs never resolved.
    pub ignore_packages: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            check_global_cache: false,
            verbose: false,
            parallel: true,
            command_timeout: DEFAULT_TIMEOUT,
            ignore_packages: Vec::new(),
        }
    }
}

type ToolVersions = HashMap<String, ResolvedVersion>;

pub struct ScanOrchestrator {
    options: ScanOptions,
    probe: Arc<dyn CommandProbe>,
    global: Arc<dyn GlobalCacheLookup>,
}

impl ScanOrchestrator {
    /// Orchestrator backed by real executables and cache directories.
    pub fn new(options: ScanOptions) -> Self {
        let probe: Arc<dyn CommandProbe> = Arc::new(SystemProbe::with_timeout(options.command_timeout));
        let global = Arc::new(GlobalCache::new(Arc::clone(&probe)));
        Self::with_components(options, probe, global)
    }

    pub fn with_components(
        options: ScanOptions,
        probe: Arc<dyn CommandProbe>,
        global: Arc<dyn GlobalCacheLookup>,
    ) -> Self {
        Self {
            options,
            probe,
            global,
        }
    }

    /// Whether the global cache may be consulted for `threat`.
    pub fn global_cache_enabled(&self, threat: &ThreatDefinition) -> bool {
        self.options.check_global_cache || threat.check_global_cache || self.options.verbose
    }

    /// Scans every root for every threat.
    pub async fn scan(&self, threats: &[ThreatDefinition], roots: &[PathBuf]) -> ScanReport {
        let contexts: Vec<Arc<ProjectContext>> = unique_roots(roots)
            .iter()
            .map(|root| Arc::new(ProjectContext::new(root)))
            .collect();

        let home = if threats.iter().any(|t| t.scan_home) {
            dirs::home_dir()
                .filter(|home| !contexts.iter().any(|ctx| &ctx.root == home))
                .map(|home| Arc::new(ProjectContext::new(&home)))
        } else {
            None
        };

        let tools = self.tool_versions(threats).await;

        let outcomes = if self.options.parallel {
            join_all(
                threats
                    .iter()
                    .map(|threat| self.scan_threat(threat, &contexts, home.as_ref(), &tools)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(threats.len());
            for threat in threats {
                outcomes.push(self.scan_threat(threat, &contexts, home.as_ref(), &tools).await);
            }
            outcomes
        };

        let mut scanned: Vec<PathBuf> = contexts.iter().map(|ctx| ctx.root.clone()).collect();
        if let Some(home) = &home {
            scanned.push(home.root.clone());
        }

        let report = ScanReport::new(scanned, outcomes);
        info!(
            threats = threats.len(),
            triggered = report.triggered().count(),
            findings = report.found_indicators(),
            "scan complete"
        );
        report
    }

    async fn scan_threat(
        &self,
        threat: &ThreatDefinition,
        contexts: &[Arc<ProjectContext>],
        home: Option<&Arc<ProjectContext>>,
        tools: &ToolVersions,
    ) -> ThreatOutcome {
        let mut targets: Vec<Arc<ProjectContext>> = contexts.to_vec();
        if threat.scan_home {
            targets.extend(home.cloned());
        }

        let per_root = join_all(
            targets
                .iter()
                .map(|ctx| self.classify_packages(threat, Arc::clone(ctx))),
        )
        .await;
        let mut results: Vec<ClassificationResult> = per_root.into_iter().flatten().collect();

        for (tool, rule) in &threat.tool_rules {
            let resolved = tools.get(tool).cloned().unwrap_or_default();
            results.push(ClassificationResult {
                subject: tool.clone(),
                kind: SubjectKind::Tool,
                root: None,
                status: classify(&resolved, rule),
                resolved,
            });
        }

        let mut indicators = Vec::new();
        if !threat.indicators.is_empty() {
            let walks = join_all(targets.iter().map(|ctx| {
                let root = ctx.root.clone();
                let wanted = threat.indicators.clone();
                tokio::task::spawn_blocking(move || indicator::scan_tree(&root, &wanted))
            }))
            .await;
            for walk in walks {
                match walk {
                    Ok(findings) => indicators.extend(findings),
                    Err(e) => warn!(threat = %threat.id, error = %e, "indicator walk failed"),
                }
            }
            indicators.extend(indicator::scan_processes(self.probe.as_ref(), &threat.indicators).await);
        }

        let outcome = ThreatOutcome {
            threat: threat.id.clone(),
            name: threat.display_name().to_string(),
            triggered: results.iter().any(|r| r.status == ClassificationStatus::Vulnerable)
                || !indicators.is_empty(),
            results,
            indicators,
            remediation: threat.remediation.clone(),
        };

        if outcome.triggered {
            warn!(threat = %outcome.threat, findings = outcome.finding_count(), "threat triggered");
        } else {
            debug!(threat = %outcome.threat, "threat not triggered");
        }
        outcome
    }

    /// Resolves and classifies every ruled package of `threat` under one root.
    async fn classify_packages(
        &self,
        threat: &ThreatDefinition,
        ctx: Arc<ProjectContext>,
    ) -> Vec<ClassificationResult> {
        let rules: Vec<(&String, &VersionRule)> = threat
            .package_rules
            .iter()
            .filter(|(package, _)| !matches_any(&self.options.ignore_packages, package))
            .collect();
        if rules.is_empty() {
            return Vec::new();
        }

        let names: Vec<String> = rules.iter().map(|(package, _)| (*package).clone()).collect();
        let local_ctx = Arc::clone(&ctx);
        let local = match tokio::task::spawn_blocking(move || {
            names
                .iter()
                .map(|package| local_ctx.resolve_local(package))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(local) => local,
            Err(e) => {
                warn!(root = %ctx.root.display(), error = %e, "local resolution failed");
                vec![ResolvedVersion::none(); rules.len()]
            }
        };

        let gated = self.global_cache_enabled(threat);
        let mut results = Vec::with_capacity(rules.len());
        for ((package, rule), mut resolved) in rules.into_iter().zip(local) {
            if !resolved.is_found() && gated {
                resolved = self.global_lookup(package, ctx.kind).await;
            }

            let status = classify(&resolved, rule);
            if let Some(version) = &resolved.version {
                debug!(
                    package = %package,
                    version = %version,
                    source = %resolved.source,
                    %status,
                    "classified"
                );
            }
            results.push(ClassificationResult {
                subject: package.clone(),
                kind: SubjectKind::Package,
                root: Some(ctx.root.clone()),
                resolved,
                status,
            });
        }
        results
    }

    async fn global_lookup(&self, package: &str, kind: PackageManagerKind) -> ResolvedVersion {
        match self.global.lookup(package, kind).await {
            Some(version) => ResolvedVersion::found(version, VersionSource::GlobalCache),
            None => ResolvedVersion::none(),
        }
    }

    /// Queries every ruled tool once.
    async fn tool_versions(&self, threats: &[ThreatDefinition]) -> ToolVersions {
        let names: BTreeSet<&String> = threats.iter().flat_map(|t| t.tool_rules.keys()).collect();
        let resolved = join_all(names.iter().map(|tool| self.tool_version(tool))).await;
        names
            .into_iter()
            .cloned()
            .zip(resolved)
            .collect()
    }

    async fn tool_version(&self, tool: &str) -> ResolvedVersion {
        let executable = PackageManagerKind::from_name(tool)
            .executable()
            .unwrap_or(tool);
        match self
            .probe
            .output(executable, &["--version"])
            .await
            .and_then(|output| parse_version_output(&output))
        {
            Some(version) => {
                debug!(tool, version = %version, "tool version");
                ResolvedVersion::found(version, VersionSource::ToolBinary)
            }
            None => ResolvedVersion::none(),
        }
    }
}

/// Absolute, de-duplicated roots in the given order.
fn unique_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    roots
        .iter()
        .map(|root| std::path::absolute(root).unwrap_or_else(|_| root.clone()))
        .filter(|root| seen.insert(root.clone()))
        .collect()
}
