// src/ledger.rs

//! The binding ledger
//!
//! Every change to the unified root is first staged here as a binding in
//! `pending_create` or `pending_delete`, and only [`Ledger::commit`] touches
//! the disk. Once every pending delete is applied, the surviving pending
//! creates together with the committed rows describe the final root exactly,
//! so a crash between staging and commit never needs a filesystem rescan.
//!
//! Redundant operations are no-ops rather than errors: staging a delete twice
//! or soft-unlinking a package twice leaves the same state as doing it once.

use crate::db::models::{Binding, CommitState, OwnerEdit};
use crate::error::{Error, Result};
use crate::filesystem::FilesystemApplier;
use rusqlite::Connection;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Counts of disk operations performed by a commit or discard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub removed: usize,
    pub created: usize,
}

/// Number of path components below `/` (`/` itself is 0)
fn path_depth(rootfs_path: &str) -> usize {
    rootfs_path
        .trim_end_matches('/')
        .matches('/')
        .count()
}

/// Staging primitives over the bindings table
///
/// The ledger borrows a connection, so callers decide the SQLite transaction
/// it runs in.
#[derive(Clone, Copy)]
pub struct Ledger<'a> {
    conn: &'a Connection,
}

impl<'a> Ledger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stage a new binding in `pending_create`
    pub fn stage_create(
        &self,
        rootfs_path: &str,
        physical_path: Option<String>,
        owners: BTreeSet<String>,
        shared: bool,
    ) -> Result<i64> {
        if !shared && owners.len() != 1 {
            return Err(Error::InvalidBinding(format!(
                "{}: an exclusive binding needs exactly one owner, got {}",
                rootfs_path,
                owners.len()
            )));
        }

        let mut binding = Binding {
            id: None,
            rootfs_path: rootfs_path.to_string(),
            physical_path,
            owners,
            shared,
            commit_state: CommitState::PendingCreate,
        };
        let id = binding.insert(self.conn)?;

        debug!(
            "Staged {} binding {} for {}",
            if shared { "shared" } else { "exclusive" },
            rootfs_path,
            binding.owners.iter().cloned().collect::<Vec<_>>().join(",")
        );
        Ok(id)
    }

    /// Stage a binding for deletion (no-op if missing or already staged)
    pub fn stage_delete(&self, id: i64) -> Result<()> {
        match Binding::find_by_id(self.conn, id)? {
            Some(binding) if binding.commit_state != CommitState::PendingDelete => {
                debug!("Staged delete of {}", binding.rootfs_path);
                Binding::update_state(self.conn, id, CommitState::PendingDelete)
            }
            _ => Ok(()),
        }
    }

    /// Add a package to a binding's owner set in place
    ///
    /// The edit is journaled until the next commit or discard.
    pub fn add_owner(&self, id: i64, package_name: &str) -> Result<()> {
        if Binding::add_owner(self.conn, id, package_name)? {
            OwnerEdit::record(self.conn, id, package_name, true)?;
        }
        Ok(())
    }

    /// Remove a package from a binding's owner set in place
    ///
    /// The edit is journaled until the next commit or discard.
    pub fn remove_owner(&self, id: i64, package_name: &str) -> Result<()> {
        if Binding::remove_owner(self.conn, id, package_name)? {
            OwnerEdit::record(self.conn, id, package_name, false)?;
        }
        Ok(())
    }

    /// Number of journaled owner edits not yet committed
    pub fn pending_owner_edits(&self) -> Result<usize> {
        OwnerEdit::count(self.conn)
    }

    /// Withdraw a binding: never-realized rows vanish, realized ones are
    /// staged for deletion
    pub fn retract(&self, binding: &Binding) -> Result<()> {
        let Some(id) = binding.id else {
            return Ok(());
        };

        match binding.commit_state {
            CommitState::PendingCreate => {
                debug!("Dropped unrealized binding {}", binding.rootfs_path);
                Binding::delete(self.conn, id)
            }
            CommitState::Committed => self.stage_delete(id),
            CommitState::PendingDelete => Ok(()),
        }
    }

    /// Withdraw every exclusive binding owned by a package
    ///
    /// Used before the package is relinked in the same transaction.
    pub fn soft_unlink(&self, package_name: &str) -> Result<()> {
        for binding in Binding::find_by_owner(self.conn, package_name)? {
            if !binding.shared {
                self.retract(&binding)?;
            }
        }
        Ok(())
    }

    /// The binding at a path that is not staged for deletion
    pub fn lookup_active(&self, rootfs_path: &str) -> Result<Option<Binding>> {
        let mut active = Binding::find_active_by_path(self.conn, rootfs_path)?;
        if active.len() > 1 {
            warn!(
                "{} active bindings at {}, using the oldest",
                active.len(),
                rootfs_path
            );
        }

        if active.is_empty() {
            Ok(None)
        } else {
            Ok(Some(active.swap_remove(0)))
        }
    }

    /// Apply every staged change
    ///
    /// Pending deletes are removed from disk deepest path first and then
    /// dropped; pending creates are realized shallowest path first and marked
    /// committed. Re-running a commit that was interrupted is safe as long
    /// as the applier is idempotent.
    pub fn commit(&self, applier: &dyn FilesystemApplier) -> Result<CommitSummary> {
        let mut summary = CommitSummary::default();

        let mut deletes = Binding::find_by_state(self.conn, CommitState::PendingDelete)?;
        deletes.sort_by_key(|b| std::cmp::Reverse(path_depth(&b.rootfs_path)));
        for binding in &deletes {
            applier.remove(binding)?;
            if let Some(id) = binding.id {
                Binding::delete(self.conn, id)?;
            }
            summary.removed += 1;
        }

        let mut creates = Binding::find_by_state(self.conn, CommitState::PendingCreate)?;
        creates.sort_by_key(|b| path_depth(&b.rootfs_path));
        for binding in &creates {
            applier.create(binding)?;
            if let Some(id) = binding.id {
                Binding::update_state(self.conn, id, CommitState::Committed)?;
            }
            summary.created += 1;
        }

        OwnerEdit::clear(self.conn)?;

        info!(
            "Committed bindings: {} removed, {} created",
            summary.removed, summary.created
        );
        Ok(summary)
    }

    /// Throw away every staged change and restore the committed view
    ///
    /// Journaled owner edits are undone newest first. Pending creates are
    /// removed from disk and dropped; pending deletes are put back on disk
    /// and marked committed again.
    pub fn discard(&self, applier: &dyn FilesystemApplier) -> Result<CommitSummary> {
        let mut summary = CommitSummary::default();

        let edits = OwnerEdit::list_all(self.conn)?;
        for edit in edits.iter().rev() {
            if edit.added {
                Binding::remove_owner(self.conn, edit.binding_id, &edit.package_name)?;
            } else {
                Binding::add_owner(self.conn, edit.binding_id, &edit.package_name)?;
            }
        }
        OwnerEdit::clear(self.conn)?;
        if !edits.is_empty() {
            debug!("Undid {} owner edit(s)", edits.len());
        }

        let mut creates = Binding::find_by_state(self.conn, CommitState::PendingCreate)?;
        creates.sort_by_key(|b| std::cmp::Reverse(path_depth(&b.rootfs_path)));
        for binding in &creates {
            applier.remove(binding)?;
            if let Some(id) = binding.id {
                Binding::delete(self.conn, id)?;
            }
            summary.removed += 1;
        }

        let mut deletes = Binding::find_by_state(self.conn, CommitState::PendingDelete)?;
        deletes.sort_by_key(|b| path_depth(&b.rootfs_path));
        for binding in &deletes {
            applier.create(binding)?;
            if let Some(id) = binding.id {
                Binding::update_state(self.conn, id, CommitState::Committed)?;
            }
            summary.created += 1;
        }

        info!(
            "Discarded staged bindings: {} dropped, {} restored",
            summary.removed, summary.created
        );
        Ok(summary)
    }
}
