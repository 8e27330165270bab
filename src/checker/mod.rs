//! Version ordering and vulnerability classification.
//!
//! [`classify`] applies a [`VersionRule`](crate::model::VersionRule) to a
//! [`ResolvedVersion`](crate::model::ResolvedVersion). Ordering uses
//! [`compare_versions`], a plain dotted-numeric comparator that never consults
//! the package ecosystem's own tooling.

mod version;

pub use version::{
    classify, classify_version, compare_versions, normalize_version, strip_prerelease,
};
