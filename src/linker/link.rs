// src/linker/link.rs

use super::note_displaced;
use crate::db::models::InstalledPackage;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::packages::{FileTree, Package, PackageSource, store};
use crate::version::Version;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Places package trees into the ledger
pub struct LinkEngine<'a> {
    conn: &'a Connection,
    ledger: Ledger<'a>,
    source: &'a dyn PackageSource,
    install_dir: &'a Path,
}

impl<'a> LinkEngine<'a> {
    pub fn new(conn: &'a Connection, source: &'a dyn PackageSource, install_dir: &'a Path) -> Self {
        Self {
            conn,
            ledger: Ledger::new(conn),
            source,
            install_dir,
        }
    }

    /// Stage bindings for a whole package, then relink every package it displaced
    pub fn link(&self, package: &Package) -> Result<()> {
        debug!("Linking {}", package);

        let mut displaced = Vec::new();
        self.merge(&package.name, &package.version, &package.files, 0, &mut displaced)?;

        self.relink_all(&displaced)
    }

    /// Relink each displaced package in order
    pub fn relink_all(&self, displaced: &[String]) -> Result<()> {
        for name in displaced {
            self.relink(name)?;
        }
        Ok(())
    }

    /// Re-place a package's tree against the current ledger state
    ///
    /// The package's current version is looked up in the installed-package
    /// table and its tree is fetched from the package source. A package that
    /// cannot be resolved fails the whole operation.
    pub fn relink(&self, name: &str) -> Result<()> {
        let version = InstalledPackage::find_by_name(self.conn, name)?
            .and_then(|p| p.current_version)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))?;

        info!("Relinking {}-{}", name, version);
        let package = self.source.resolve(name, &version)?;

        self.ledger.soft_unlink(name)?;
        self.link(&package)
    }

    /// Place each immediate child of `subtree` for `name`
    ///
    /// `depth` counts how many shared directories were descended through; it
    /// only affects logging.
    pub fn merge(
        &self,
        name: &str,
        version: &Version,
        subtree: &FileTree,
        depth: usize,
        displaced: &mut Vec<String>,
    ) -> Result<()> {
        for (path, node) in subtree.children() {
            let Some(existing) = self.ledger.lookup_active(path)? else {
                let physical = store::private_location(self.install_dir, name, version, path);
                self.ledger.stage_create(
                    path,
                    Some(physical),
                    BTreeSet::from([name.to_string()]),
                    false,
                )?;
                continue;
            };

            let id = existing
                .id
                .ok_or_else(|| Error::InvalidBinding(format!("{}: binding has no id", path)))?;

            if existing.shared {
                if !existing.owners.contains(name) {
                    self.ledger.add_owner(id, name)?;
                }
                self.merge(name, version, node, depth + 1, displaced)?;
                continue;
            }

            let previous = existing.sole_owner().ok_or_else(|| {
                Error::InvalidBinding(format!(
                    "{}: exclusive binding with {} owners",
                    path,
                    existing.owners.len()
                ))
            })?;

            if previous == name {
                if depth == 0 {
                    debug!("{} already bound for {}, nothing to do", path, name);
                }
                continue;
            }

            info!("{} conflicts with {} at {}, sharing it", name, previous, path);
            self.ledger.soft_unlink(previous)?;
            self.ledger.stage_create(
                path,
                None,
                BTreeSet::from([previous.to_string(), name.to_string()]),
                true,
            )?;
            note_displaced(displaced, previous);

            self.merge(name, version, node, depth + 1, displaced)?;
        }

        Ok(())
    }
}
