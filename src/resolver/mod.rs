//! Installed-version resolution.
//!
//! | Module | Answers |
//! |--------|---------|
//! | [`detect`] | which package manager governs a directory |
//! | [`workspace`] | which directories belong to a monorepo |
//! | [`lockfile`] | which version a lockfile pins |
//! | [`local`] | which version is installed under `node_modules` |
//! | [`global`] | which version sits in a machine-wide cache or store |
//! | [`probe`] | what an external executable reports |
//!
//! None of these fail. Unreadable or missing inputs degrade to "no version"
//! or [`PackageManagerKind::Unknown`](crate::PackageManagerKind::Unknown).

pub mod detect;
pub mod global;
pub mod local;
pub mod lockfile;
pub mod probe;
pub mod workspace;

pub use detect::detect;
pub use global::{GlobalCache, GlobalCacheLookup};
pub use lockfile::LockfileReader;
pub use probe::{CommandProbe, SystemProbe};
