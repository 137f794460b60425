// src/linker/unlink.rs

use super::{LinkEngine, note_displaced};
use crate::db::models::{Binding, CommitState};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::packages::PackageSource;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Withdraws packages from the ledger
pub struct UnlinkEngine<'a> {
    conn: &'a Connection,
    ledger: Ledger<'a>,
    linker: LinkEngine<'a>,
}

impl<'a> UnlinkEngine<'a> {
    pub fn new(conn: &'a Connection, source: &'a dyn PackageSource, install_dir: &'a Path) -> Self {
        Self {
            conn,
            ledger: Ledger::new(conn),
            linker: LinkEngine::new(conn, source, install_dir),
        }
    }

    /// Stage the removal of every binding a package owns
    ///
    /// Shared directories left with a single other owner are deleted and
    /// that owner is relinked, so it ends up with exclusive bindings where
    /// nobody else competes for the path.
    pub fn unbind(&self, name: &str) -> Result<()> {
        debug!("Unbinding {}", name);

        let owned: Vec<Binding> = Binding::find_by_owner(self.conn, name)?
            .into_iter()
            .filter(|b| b.commit_state != CommitState::PendingDelete)
            .collect();

        let mut displaced = Vec::new();
        for binding in &owned {
            if !binding.shared {
                self.ledger.retract(binding)?;
                continue;
            }

            let id = binding.id.ok_or_else(|| {
                Error::InvalidBinding(format!("{}: binding has no id", binding.rootfs_path))
            })?;

            match binding.owners.len() {
                n if n > 2 => {
                    debug!("Leaving shared {} to {} other owners", binding.rootfs_path, n - 1);
                    self.ledger.remove_owner(id, name)?;
                }
                2 => {
                    if let Some(other) = binding.owners.iter().find(|o| o.as_str() != name) {
                        info!("{} is no longer shared, relinking {}", binding.rootfs_path, other);
                        self.ledger.soft_unlink(other)?;
                        note_displaced(&mut displaced, other);
                    }
                    self.ledger.stage_delete(id)?;
                }
                _ => self.ledger.stage_delete(id)?,
            }
        }

        self.linker.relink_all(&displaced)
    }
}
