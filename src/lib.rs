pub mod checker;
pub mod config;
pub mod error;
pub mod indicator;
pub mod model;
pub mod output;
pub mod pattern;
pub mod platform;
pub mod resolver;
pub mod scanner;
pub mod threats;

pub use config::Config;
pub use error::ThreatError;
pub use model::{
    ClassificationResult, ClassificationStatus, IndicatorFinding, IndicatorKind, Indicators,
    PackageManagerKind, Platform, ResolvedVersion, ScanReport, SubjectKind, ThreatDefinition,
    ThreatOutcome, VersionRange, VersionRule, VersionSource,
};
pub use scanner::{ScanOptions, ScanOrchestrator};
pub use threats::{load_threat_file, load_threats, LoadedThreats};
