// src/packages/mod.rs

//! Package model and the collaborators that produce packages
//!
//! A [`Package`] carries the traced tree of virtual paths it populates in the
//! unified root, plus its dependency constraints. Packages reach the linker
//! through a [`PackageSource`]; the [`cache::PackageCache`] implementation
//! backs it with an in-session map, a durable JSON trace cache and, as a last
//! resort, a crawl of the package's private storage.

pub mod archive;
pub mod cache;
pub mod crawler;
pub mod store;
pub mod traits;

pub use cache::PackageCache;
pub use traits::PackageSource;

use crate::error::{Error, Result};
use crate::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A tree of absolute virtual paths
///
/// Each child is keyed by its full path. Directories end in `/` and may have
/// children; leaf files have none. The tree of a whole package has a single
/// `/` child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    children: BTreeMap<String, FileTree>,
}

impl FileTree {
    /// An empty node (a file, or a directory with nothing below it)
    pub fn leaf() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, child: FileTree) {
        self.children.insert(path.into(), child);
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &FileTree)> {
        self.children.iter()
    }

    pub fn get(&self, path: &str) -> Option<&FileTree> {
        self.children.get(path)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Every path in the tree, sorted so parents come before children
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&FileTree> = vec![self];
        while let Some(node) = stack.pop() {
            for (path, child) in &node.children {
                out.push(path.as_str());
                stack.push(child);
            }
        }
        out.sort_unstable();
        out
    }
}

impl<K: Into<String>, const N: usize> From<[(K, FileTree); N]> for FileTree {
    fn from(entries: [(K, FileTree); N]) -> Self {
        Self {
            children: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A dependency constraint declared by a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "minversion", default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,
    #[serde(rename = "maxversion", default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<Version>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, min_version: Option<Version>, max_version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            min_version,
            max_version,
        }
    }

    pub fn range(&self) -> VersionRange {
        VersionRange::new(self.min_version.clone(), self.max_version.clone())
    }
}

/// An immutable package: identity, traced file tree and dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,
    pub files: FileTree,
    #[serde(default)]
    pub depends: Vec<Dependency>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: Version, files: FileTree, depends: Vec<Dependency>) -> Self {
        Self {
            name: name.into(),
            version,
            files,
            depends,
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Unpack an archive, move its payload into private storage and register
/// its trace with the cache
///
/// The archive's top-level directory must be named after the package it
/// contains. The unpacked copy is removed afterwards.
pub fn import_archive(
    archive_path: &Path,
    work_dir: &Path,
    install_dir: &Path,
    cache: &PackageCache,
) -> Result<Package> {
    let unpacked = archive::unpack(archive_path, work_dir)?;
    let stored = store_unpacked(archive_path, &unpacked, install_dir);

    if let Err(e) = fs::remove_dir_all(&unpacked) {
        warn!("Failed to clean up {}: {}", unpacked.display(), e);
    }

    let package = stored?;
    cache.register(package.clone())?;
    Ok(package)
}

fn store_unpacked(archive_path: &Path, unpacked: &Path, install_dir: &Path) -> Result<Package> {
    let package = crawler::map(unpacked)?;

    let expected = package.to_string();
    if unpacked.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
        return Err(Error::Manifest(format!(
            "{} contains {}, expected a {}/ directory",
            archive_path.display(),
            unpacked.display(),
            expected
        )));
    }

    store::install_payload(unpacked, install_dir, &package.name, &package.version)?;
    info!("Imported {} into private storage", package);
    Ok(package)
}
