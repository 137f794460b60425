// src/packages/cache.rs

//! Durable package trace cache
//!
//! Tracing a package means walking its whole payload, so traces are written
//! to `<cache_dir>/<name>-<version>.json` and reused. A package version never
//! changes shape once stored, which keeps the cache consistent across
//! restarts.
//!
//! Packages mapped earlier in the same process are also kept in memory: a
//! package installed in the current transaction can be displaced and relinked
//! before it has ever been resolved from disk.

use super::store;
use super::traits::PackageSource;
use super::{Package, crawler};
use crate::error::{Error, Result};
use crate::version::Version;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PackageCache {
    cache_dir: PathBuf,
    install_dir: PathBuf,
    session: RefCell<HashMap<String, Package>>,
}

fn cache_key(name: &str, version: &Version) -> String {
    format!("{}-{}", name, version)
}

impl PackageCache {
    pub fn new(cache_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            install_dir: install_dir.into(),
            session: RefCell::new(HashMap::new()),
        }
    }

    /// Path of the durable trace for a package version
    pub fn trace_path(&self, name: &str, version: &Version) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", cache_key(name, version)))
    }

    /// Remember a freshly mapped package for this session and persist its trace
    pub fn register(&self, package: Package) -> Result<()> {
        self.write_trace(&package)?;
        info!("Placing {} in cache", package);
        self.session
            .borrow_mut()
            .insert(cache_key(&package.name, &package.version), package);
        Ok(())
    }

    fn write_trace(&self, package: &Package) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let path = self.trace_path(&package.name, &package.version);
        fs::write(&path, serde_json::to_vec_pretty(package)?)?;
        debug!("Wrote trace {}", path.display());
        Ok(())
    }

    fn read_trace(&self, path: &Path, name: &str, version: &Version) -> Result<Option<Package>> {
        let package: Package = match serde_json::from_slice(&fs::read(path)?) {
            Ok(p) => p,
            Err(e) => {
                warn!("Ignoring unreadable trace {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if package.name != name || &package.version != version {
            warn!(
                "Trace {} describes {}, not {}-{}",
                path.display(),
                package,
                name,
                version
            );
            return Ok(None);
        }

        Ok(Some(package))
    }
}

impl PackageSource for PackageCache {
    fn resolve(&self, name: &str, version: &Version) -> Result<Package> {
        let key = cache_key(name, version);
        if let Some(package) = self.session.borrow().get(&key) {
            return Ok(package.clone());
        }

        if !store::is_stored(&self.install_dir, name, version) {
            return Err(Error::NotInstalled {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        let trace_path = self.trace_path(name, version);
        let cached = if trace_path.is_file() {
            self.read_trace(&trace_path, name, version)?
        } else {
            None
        };

        let package = match cached {
            Some(package) => package,
            None => {
                debug!("No usable trace for {}, crawling private storage", key);
                let package = crawler::map(&store::private_root(&self.install_dir, name, version))?;
                self.write_trace(&package)?;
                package
            }
        };

        self.session.borrow_mut().insert(key, package.clone());
        Ok(package)
    }
}
