// src/transaction.rs

//! Install, upgrade and uninstall transactions, and crash recovery
//!
//! A transaction runs in three steps:
//!
//! 1. Validate: dependency ranges are resolved before anything is written.
//! 2. Stage: package metadata, dependency records, a pending changeset and
//!    every staged binding are written in one SQLite transaction. Any
//!    failure here, including a displaced package that cannot be relinked,
//!    rolls all of it back.
//! 3. Commit: the ledger applies the staged bindings to disk and the
//!    changeset is marked applied, again in one SQLite transaction.
//!
//! If the process dies during step 3, the staged rows survive and every
//! later transaction is refused until [`TransactionManager::recover`] runs.

use crate::db;
use crate::db::models::{
    Binding, Changeset, ChangesetStatus, CommitState, DependencyRecord, InstalledPackage,
    OwnerEdit, PackageSnapshot,
};
use crate::error::{Error, Result};
use crate::filesystem::FilesystemApplier;
use crate::ledger::{CommitSummary, Ledger};
use crate::linker::{LinkEngine, UnlinkEngine};
use crate::packages::{Package, PackageSource};
use crate::resolver::DependencyResolver;
use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSummary {
    pub changeset_id: i64,
    pub created: usize,
    pub removed: usize,
}

/// Refuse to start while staged changes from an earlier run remain
fn ensure_clean(conn: &Connection) -> Result<()> {
    let pending = Binding::count_by_state(conn, CommitState::PendingCreate)?
        + Binding::count_by_state(conn, CommitState::PendingDelete)?
        + OwnerEdit::count(conn)?;
    if pending > 0 {
        return Err(Error::PendingTransaction(pending));
    }
    Ok(())
}

fn describe(action: &str, names: &[String]) -> String {
    format!("{} {}", action, names.join(", "))
}

/// Runs one install or uninstall as a validated, staged, committed unit
pub struct TransactionGuard<'a> {
    conn: &'a mut Connection,
    source: &'a dyn PackageSource,
    applier: &'a dyn FilesystemApplier,
    install_dir: &'a Path,
}

impl<'a> TransactionGuard<'a> {
    pub fn new(
        conn: &'a mut Connection,
        source: &'a dyn PackageSource,
        applier: &'a dyn FilesystemApplier,
        install_dir: &'a Path,
    ) -> Self {
        Self {
            conn,
            source,
            applier,
            install_dir,
        }
    }

    /// Install, reinstall or upgrade packages
    ///
    /// Reinstalling the linked version soft-unlinks the package and merges
    /// it again; switching to another version unbinds the old one first.
    pub fn install(&mut self, packages: &[Package]) -> Result<TransactionSummary> {
        ensure_clean(self.conn)?;

        let ranges = DependencyResolver::new(self.conn).resolve(packages)?;
        info!("Dependencies resolved: {} constraint(s)", ranges.len());

        let description = describe(
            "Install",
            &packages.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        );
        let (source, install_dir) = (self.source, self.install_dir);

        let changeset_id = db::transaction(self.conn, |tx| {
            let mut changeset = Changeset::new(description);
            let changeset_id = changeset.insert(tx)?;

            let ledger = Ledger::new(tx);
            let linker = LinkEngine::new(tx, source, install_dir);
            let unlinker = UnlinkEngine::new(tx, source, install_dir);

            for package in packages {
                PackageSnapshot::capture(tx, &package.name)?.record(tx, changeset_id)?;

                match InstalledPackage::integrate(tx, &package.name, &package.version)? {
                    Some(previous) if previous == package.version => {
                        info!("Reinstalling {}", package);
                        ledger.soft_unlink(&package.name)?;
                    }
                    Some(previous) => {
                        info!("Switching {} from {} to {}", package.name, previous, package.version);
                        unlinker.unbind(&package.name)?;
                    }
                    None => info!("Installing {}", package),
                }

                DependencyRecord::delete_by_owner(tx, &package.name)?;
                for dep in &package.depends {
                    DependencyRecord::new(dep.name.clone(), package.name.clone(), dep.range())
                        .insert(tx)?;
                }

                linker.link(package)?;
            }

            Ok(changeset_id)
        })?;

        self.commit(changeset_id)
    }

    /// Uninstall packages
    ///
    /// Metadata is kept with no current version, and private storage stays
    /// on disk. Installed packages that still depend on a removed one are
    /// reported but do not block the removal.
    pub fn uninstall(&mut self, names: &[String]) -> Result<TransactionSummary> {
        ensure_clean(self.conn)?;

        for name in names {
            let linked = InstalledPackage::find_by_name(self.conn, name)?
                .is_some_and(|p| p.current_version.is_some());
            if !linked {
                return Err(Error::PackageNotFound(name.clone()));
            }
        }

        let description = describe("Remove", names);
        let (source, install_dir) = (self.source, self.install_dir);

        let changeset_id = db::transaction(self.conn, |tx| {
            let mut changeset = Changeset::new(description);
            let changeset_id = changeset.insert(tx)?;

            let unlinker = UnlinkEngine::new(tx, source, install_dir);

            for name in names {
                PackageSnapshot::capture(tx, name)?.record(tx, changeset_id)?;
            }

            for name in names {
                info!("Removing {}", name);
                unlinker.unbind(name)?;
                DependencyRecord::delete_by_owner(tx, name)?;
                InstalledPackage::unlink(tx, name)?;

                for record in DependencyRecord::find_by_name(tx, name)? {
                    if !names.contains(&record.owner_package) {
                        warn!("{} still depends on {}", record.owner_package, name);
                    }
                }
            }

            Ok(changeset_id)
        })?;

        self.commit(changeset_id)
    }

    fn commit(&mut self, changeset_id: i64) -> Result<TransactionSummary> {
        let applier = self.applier;

        let summary = db::transaction(self.conn, |tx| {
            let summary = Ledger::new(tx).commit(applier)?;
            Changeset::update_status(tx, changeset_id, ChangesetStatus::Applied)?;
            PackageSnapshot::delete_by_changeset(tx, changeset_id)?;
            Ok(summary)
        })?;

        Ok(TransactionSummary {
            changeset_id,
            created: summary.created,
            removed: summary.removed,
        })
    }
}

/// What an interrupted transaction left behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub pending_create: usize,
    pub pending_delete: usize,
    pub pending_owner_edits: usize,
    pub open_changesets: usize,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.pending_create == 0
            && self.pending_delete == 0
            && self.pending_owner_edits == 0
            && self.open_changesets == 0
    }
}

/// How to finish an interrupted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Re-run the commit so the staged end state is reached
    RollForward,
    /// Drop the staged changes and restore the state before the transaction
    Discard,
}

/// Detects and repairs interrupted transactions
pub struct TransactionManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> TransactionManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        Ok(ConsistencyReport {
            pending_create: Binding::count_by_state(self.conn, CommitState::PendingCreate)?,
            pending_delete: Binding::count_by_state(self.conn, CommitState::PendingDelete)?,
            pending_owner_edits: OwnerEdit::count(self.conn)?,
            open_changesets: Changeset::find_by_status(self.conn, ChangesetStatus::Pending)?.len(),
        })
    }

    /// The newest changeset that never reached the applied state
    pub fn current_transaction(&self) -> Result<Option<Changeset>> {
        Ok(Changeset::find_by_status(self.conn, ChangesetStatus::Pending)?
            .into_iter()
            .next())
    }

    /// Finish or discard whatever an interrupted transaction staged
    ///
    /// Discarding also puts back the package metadata each open changeset
    /// replaced, newest changeset first.
    pub fn recover(
        &mut self,
        policy: RecoveryPolicy,
        applier: &dyn FilesystemApplier,
    ) -> Result<CommitSummary> {
        let report = self.check_consistency()?;
        if report.is_clean() {
            info!("Nothing to recover");
            return Ok(CommitSummary::default());
        }

        warn!(
            "Recovering ({:?}): {} pending create(s), {} pending delete(s), {} owner edit(s), {} open changeset(s)",
            policy,
            report.pending_create,
            report.pending_delete,
            report.pending_owner_edits,
            report.open_changesets
        );

        db::transaction(self.conn, |tx| {
            let ledger = Ledger::new(tx);
            let (summary, status) = match policy {
                RecoveryPolicy::RollForward => (ledger.commit(applier)?, ChangesetStatus::Applied),
                RecoveryPolicy::Discard => (ledger.discard(applier)?, ChangesetStatus::RolledBack),
            };

            for changeset in Changeset::find_by_status(tx, ChangesetStatus::Pending)? {
                let Some(id) = changeset.id else {
                    continue;
                };

                if policy == RecoveryPolicy::Discard {
                    for snapshot in PackageSnapshot::find_by_changeset(tx, id)? {
                        info!("Restoring metadata of {}", snapshot.name);
                        snapshot.restore(tx)?;
                    }
                }
                PackageSnapshot::delete_by_changeset(tx, id)?;
                Changeset::update_status(tx, id, status.clone())?;
            }

            Ok(summary)
        })
    }
}
