//! Error types for threat definition loading.
//!
//! Version resolution never fails: missing files, unreadable manifests and
//! absent executables all degrade to "not found". The only hard errors in the
//! library are structurally invalid threat definitions, and those are scoped
//! to a single file so the rest of the scan can continue.

use std::path::PathBuf;

/// An error raised while loading one threat definition file.
#[derive(Debug, thiserror::Error)]
pub enum ThreatError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid JSON or YAML for the threat schema.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A required field is missing or empty.
    #[error("{}: missing required field `{field}`", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    /// The file extension is not one of `.json`, `.yaml`, `.yml`.
    #[error("unsupported threat definition format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
}

impl ThreatError {
    /// Path of the definition file this error refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            ThreatError::Read { path, .. }
            | ThreatError::Parse { path, .. }
            | ThreatError::MissingField { path, .. }
            | ThreatError::UnsupportedFormat { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = ThreatError::MissingField {
            path: PathBuf::from("threats/shai-hulud.json"),
            field: "description",
        };
        let msg = err.to_string();
        assert!(msg.contains("shai-hulud.json"));
        assert!(msg.contains("`description`"));
    }

    #[test]
    fn test_read_error_display() {
        let err = ThreatError::Read {
            path: PathBuf::from("/tmp/missing.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("/tmp/missing.yaml"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_error_path() {
        let err = ThreatError::UnsupportedFormat {
            path: PathBuf::from("threats/readme.txt"),
        };
        assert_eq!(err.path(), &PathBuf::from("threats/readme.txt"));
    }
}
