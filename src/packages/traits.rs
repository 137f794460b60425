// src/packages/traits.rs

//! Common traits for package providers

use super::Package;
use crate::error::Result;
use crate::version::Version;

/// Resolves an installed (or in-flight) package to its traced form
///
/// Implementations must be consistent: once a package's tree has been traced,
/// every call for the same name and version returns an identical tree, within
/// a process and across restarts. The linker relies on this when relinking a
/// displaced package; it never re-derives a tree itself.
pub trait PackageSource {
    /// Resolve `name`-`version`, failing with `NotInstalled` if it has no
    /// installed footprint and no cached trace
    fn resolve(&self, name: &str, version: &Version) -> Result<Package>;
}
