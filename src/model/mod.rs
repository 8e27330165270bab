//! Core data types for threat definitions and scan results.
//!
//! This module contains the fundamental types used throughout threatscan:
//!
//! - [`ThreatDefinition`] - A declarative description of one supply-chain threat
//! - [`VersionRule`] - Exact, threshold and range rules for one package or tool
//! - [`PackageManagerKind`] - The dependency manager governing a directory
//! - [`ResolvedVersion`] - An installed version and where it was found
//! - [`ThreatOutcome`] - Per-threat classifications and indicator hits
//! - [`ScanReport`] - Complete scan results
//!
//! # Example
//!
//! ```
//! use threatscan::{ClassificationStatus, ResolvedVersion, VersionRule, VersionSource};
//! use threatscan::checker::classify;
//!
//! let rule = VersionRule {
//!     vulnerable_versions: ["1.0.0".to_string()].into_iter().collect(),
//!     ..VersionRule::default()
//! };
//! let resolved = ResolvedVersion::found("1.0.0", VersionSource::RootLock);
//!
//! assert_eq!(classify(&resolved, &rule), ClassificationStatus::Vulnerable);
//! ```

mod manager;
mod result;
mod threat;

pub use manager::*;
pub use result::*;
pub use threat::*;
