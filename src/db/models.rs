// src/db/models.rs

//! Data models for Bindery database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

use crate::error::Result;
use crate::version::{Version, VersionRange};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

/// Parse a text column into a typed value, surfacing bad data as a conversion failure
fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn parse_optional_column<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn conversion_error(idx: usize, e: impl Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        )),
    )
}

/// Commit state of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitState {
    /// Realized on disk
    Committed,
    /// Staged; realized by the next commit
    PendingCreate,
    /// Staged; removed by the next commit
    PendingDelete,
}

impl CommitState {
    pub fn as_str(&self) -> &str {
        match self {
            CommitState::Committed => "committed",
            CommitState::PendingCreate => "pending_create",
            CommitState::PendingDelete => "pending_delete",
        }
    }
}

impl FromStr for CommitState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "committed" => Ok(CommitState::Committed),
            "pending_create" => Ok(CommitState::PendingCreate),
            "pending_delete" => Ok(CommitState::PendingDelete),
            _ => Err(format!("Invalid commit state: {}", s)),
        }
    }
}

/// A Binding maps one path of the unified root onto its backing storage
///
/// Exclusive bindings (`shared == false`) have exactly one owner and point
/// into that owner's private storage. Shared bindings are real directories
/// (`physical_path == None`) whose contents are bound entry by entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub id: Option<i64>,
    pub rootfs_path: String,
    pub physical_path: Option<String>,
    pub owners: BTreeSet<String>,
    pub shared: bool,
    pub commit_state: CommitState,
}

const BINDING_COLUMNS: &str = "id, rootfs_path, physical_path, shared, commit_state";

impl Binding {
    /// A staged exclusive binding into one package's private storage
    #[cfg(test)]
    pub fn exclusive(rootfs_path: String, physical_path: String, owner: String) -> Self {
        Self {
            id: None,
            rootfs_path,
            physical_path: Some(physical_path),
            owners: BTreeSet::from([owner]),
            shared: false,
            commit_state: CommitState::PendingCreate,
        }
    }

    /// A staged shared directory
    #[cfg(test)]
    pub fn shared(rootfs_path: String, owners: BTreeSet<String>) -> Self {
        Self {
            id: None,
            rootfs_path,
            physical_path: None,
            owners,
            shared: true,
            commit_state: CommitState::PendingCreate,
        }
    }

    /// The owner of an exclusive binding
    pub fn sole_owner(&self) -> Option<&str> {
        if self.shared || self.owners.len() != 1 {
            return None;
        }
        self.owners.iter().next().map(String::as_str)
    }

    /// Insert this binding and its owner set into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO bindings (rootfs_path, physical_path, shared, commit_state)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &self.rootfs_path,
                &self.physical_path,
                self.shared,
                self.commit_state.as_str(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        for owner in &self.owners {
            Self::add_owner(conn, id, owner)?;
        }

        self.id = Some(id);
        Ok(id)
    }

    /// Find a binding by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bindings WHERE id = ?1",
            BINDING_COLUMNS
        ))?;

        let binding = stmt.query_row([id], Self::from_row).optional()?;

        match binding {
            Some(mut b) => {
                b.owners = Self::load_owners(conn, id)?;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    /// Find every binding at a path that is not staged for deletion
    pub fn find_active_by_path(conn: &Connection, rootfs_path: &str) -> Result<Vec<Self>> {
        Self::query_with_owners(
            conn,
            &format!(
                "SELECT {} FROM bindings
                 WHERE rootfs_path = ?1 AND commit_state != 'pending_delete'
                 ORDER BY id",
                BINDING_COLUMNS
            ),
            [rootfs_path],
        )
    }

    /// Find every binding owned (solely or jointly) by a package
    pub fn find_by_owner(conn: &Connection, package_name: &str) -> Result<Vec<Self>> {
        Self::query_with_owners(
            conn,
            "SELECT b.id, b.rootfs_path, b.physical_path, b.shared, b.commit_state
             FROM bindings b
             JOIN binding_owners o ON o.binding_id = b.id
             WHERE o.package_name = ?1
             ORDER BY b.rootfs_path, b.id",
            [package_name],
        )
    }

    /// Find bindings in a given commit state
    pub fn find_by_state(conn: &Connection, state: CommitState) -> Result<Vec<Self>> {
        Self::query_with_owners(
            conn,
            &format!(
                "SELECT {} FROM bindings WHERE commit_state = ?1 ORDER BY rootfs_path, id",
                BINDING_COLUMNS
            ),
            [state.as_str()],
        )
    }

    /// List all bindings
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        Self::query_with_owners(
            conn,
            &format!(
                "SELECT {} FROM bindings ORDER BY rootfs_path, id",
                BINDING_COLUMNS
            ),
            [],
        )
    }

    /// Count bindings in a given commit state
    pub fn count_by_state(conn: &Connection, state: CommitState) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bindings WHERE commit_state = ?1",
            [state.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Update the commit state of a binding
    pub fn update_state(conn: &Connection, id: i64, state: CommitState) -> Result<()> {
        conn.execute(
            "UPDATE bindings SET commit_state = ?1 WHERE id = ?2",
            params![state.as_str(), id],
        )?;
        Ok(())
    }

    /// Add a package to a binding's owner set
    ///
    /// Returns whether the set changed.
    pub fn add_owner(conn: &Connection, id: i64, package_name: &str) -> Result<bool> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO binding_owners (binding_id, package_name) VALUES (?1, ?2)",
            params![id, package_name],
        )?;
        Ok(changed > 0)
    }

    /// Remove a package from a binding's owner set
    ///
    /// Returns whether the set changed.
    pub fn remove_owner(conn: &Connection, id: i64, package_name: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM binding_owners WHERE binding_id = ?1 AND package_name = ?2",
            params![id, package_name],
        )?;
        Ok(changed > 0)
    }

    /// Delete a binding by ID (owners are cascade-deleted)
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM bindings WHERE id = ?1", [id])?;
        Ok(())
    }

    fn load_owners(conn: &Connection, id: i64) -> Result<BTreeSet<String>> {
        let mut stmt = conn.prepare(
            "SELECT package_name FROM binding_owners WHERE binding_id = ?1 ORDER BY package_name",
        )?;

        let owners = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<BTreeSet<String>, _>>()?;

        Ok(owners)
    }

    fn query_with_owners<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(sql)?;

        let mut bindings = stmt
            .query_map(params, Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for binding in &mut bindings {
            if let Some(id) = binding.id {
                binding.owners = Self::load_owners(conn, id)?;
            }
        }

        Ok(bindings)
    }

    /// Convert a database row to a Binding (owners are loaded separately)
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            rootfs_path: row.get(1)?,
            physical_path: row.get(2)?,
            owners: BTreeSet::new(),
            shared: row.get(3)?,
            commit_state: parse_column(row, 4)?,
        })
    }
}

/// An owner-set change made in place on an existing binding
///
/// The staged transaction's edits are kept until it is committed or
/// discarded, so a discard can put every owner set back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerEdit {
    pub id: i64,
    pub binding_id: i64,
    pub package_name: String,
    /// `true` if the package was added, `false` if it was removed
    pub added: bool,
}

impl OwnerEdit {
    pub fn record(conn: &Connection, binding_id: i64, package_name: &str, added: bool) -> Result<()> {
        conn.execute(
            "INSERT INTO owner_edits (binding_id, package_name, added) VALUES (?1, ?2, ?3)",
            params![binding_id, package_name, added],
        )?;
        Ok(())
    }

    /// All staged edits, oldest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, binding_id, package_name, added FROM owner_edits ORDER BY id",
        )?;

        let edits = stmt
            .query_map([], |row| {
                Ok(Self {
                    id: row.get(0)?,
                    binding_id: row.get(1)?,
                    package_name: row.get(2)?,
                    added: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(edits)
    }

    pub fn count(conn: &Connection) -> Result<usize> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM owner_edits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM owner_edits", [])?;
        Ok(())
    }
}

/// A package that has been integrated into the system at least once
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    /// `None` once the package has been unlinked
    pub current_version: Option<Version>,
    pub available_versions: BTreeSet<Version>,
    pub installed_at: Option<String>,
}

impl InstalledPackage {
    /// Find an installed package by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, current_version, installed_at FROM packages WHERE name = ?1",
        )?;

        let package = stmt.query_row([name], Self::from_row).optional()?;

        match package {
            Some(mut p) => {
                p.available_versions = Self::load_versions(conn, p.id)?;
                Ok(Some(p))
            }
            None => Ok(None),
        }
    }

    /// List all packages, optionally filtered by a name substring
    pub fn list(conn: &Connection, pattern: Option<&str>) -> Result<Vec<Self>> {
        let like = format!("%{}%", pattern.unwrap_or(""));
        let mut stmt = conn.prepare(
            "SELECT id, name, current_version, installed_at FROM packages
             WHERE name LIKE ?1 ORDER BY name",
        )?;

        let mut packages = stmt
            .query_map([like], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for package in &mut packages {
            package.available_versions = Self::load_versions(conn, package.id)?;
        }

        Ok(packages)
    }

    /// Record that `version` of `name` is now the linked version
    ///
    /// Creates the package row on first integration, sets the current
    /// version and adds it to the available versions. Returns the version
    /// that was linked before, if any.
    pub fn integrate(conn: &Connection, name: &str, version: &Version) -> Result<Option<Version>> {
        let previous = Self::find_by_name(conn, name)?;

        let id = match &previous {
            Some(p) => {
                conn.execute(
                    "UPDATE packages SET current_version = ?1 WHERE name = ?2",
                    params![version.to_string(), name],
                )?;
                p.id.unwrap_or_default()
            }
            None => {
                conn.execute(
                    "INSERT INTO packages (name, current_version) VALUES (?1, ?2)",
                    params![name, version.to_string()],
                )?;
                conn.last_insert_rowid()
            }
        };

        conn.execute(
            "INSERT OR IGNORE INTO package_versions (package_id, version) VALUES (?1, ?2)",
            params![id, version.to_string()],
        )?;

        Ok(previous.and_then(|p| p.current_version))
    }

    /// Mark a package as no longer linked; its history is kept
    pub fn unlink(conn: &Connection, name: &str) -> Result<()> {
        conn.execute(
            "UPDATE packages SET current_version = NULL WHERE name = ?1",
            [name],
        )?;
        Ok(())
    }

    fn load_versions(conn: &Connection, id: Option<i64>) -> Result<BTreeSet<Version>> {
        let Some(id) = id else {
            return Ok(BTreeSet::new());
        };

        let mut stmt = conn.prepare("SELECT version FROM package_versions WHERE package_id = ?1")?;

        let versions = stmt
            .query_map([id], |row| parse_column::<Version>(row, 0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        Ok(versions)
    }

    /// Convert a database row to an InstalledPackage (versions are loaded separately)
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            current_version: parse_optional_column(row, 2)?,
            available_versions: BTreeSet::new(),
            installed_at: row.get(3)?,
        })
    }
}

/// A version constraint one installed package places on another
#[derive(Debug, Clone)]
pub struct DependencyRecord {
    pub id: Option<i64>,
    pub dependency_name: String,
    pub owner_package: String,
    pub version_range: VersionRange,
}

impl DependencyRecord {
    pub fn new(dependency_name: String, owner_package: String, version_range: VersionRange) -> Self {
        Self {
            id: None,
            dependency_name,
            owner_package,
            version_range,
        }
    }

    /// Insert this dependency record into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO dependencies (name, owner, min_version, max_version) VALUES (?1, ?2, ?3, ?4)",
            params![
                &self.dependency_name,
                &self.owner_package,
                self.version_range.min_version.as_ref().map(|v| v.to_string()),
                self.version_range.max_version.as_ref().map(|v| v.to_string()),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all constraints recorded against a dependency name
    pub fn find_by_name(conn: &Connection, dependency_name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, min_version, max_version FROM dependencies
             WHERE name = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map([dependency_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Find all dependencies declared by a package
    pub fn find_by_owner(conn: &Connection, owner_package: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, min_version, max_version FROM dependencies
             WHERE owner = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map([owner_package], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Delete all dependencies declared by a package
    pub fn delete_by_owner(conn: &Connection, owner_package: &str) -> Result<()> {
        conn.execute("DELETE FROM dependencies WHERE owner = ?1", [owner_package])?;
        Ok(())
    }

    /// Convert a database row to a DependencyRecord
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            dependency_name: row.get(1)?,
            owner_package: row.get(2)?,
            version_range: VersionRange::new(
                parse_optional_column(row, 3)?,
                parse_optional_column(row, 4)?,
            ),
        })
    }
}

/// Package metadata as it stood before a pending changeset touched it
///
/// Recorded once per package when a transaction stages, and used to put
/// the metadata back if that transaction is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    pub name: String,
    /// Whether the package had a row at all
    pub known: bool,
    pub current_version: Option<Version>,
    pub available_versions: BTreeSet<Version>,
    pub depends: Vec<(String, VersionRange)>,
}

impl PackageSnapshot {
    /// Capture the current metadata of a package
    pub fn capture(conn: &Connection, name: &str) -> Result<Self> {
        let depends = DependencyRecord::find_by_owner(conn, name)?
            .into_iter()
            .map(|r| (r.dependency_name, r.version_range))
            .collect();

        Ok(match InstalledPackage::find_by_name(conn, name)? {
            Some(package) => Self {
                name: name.to_string(),
                known: true,
                current_version: package.current_version,
                available_versions: package.available_versions,
                depends,
            },
            None => Self {
                name: name.to_string(),
                known: false,
                current_version: None,
                available_versions: BTreeSet::new(),
                depends,
            },
        })
    }

    /// Attach this snapshot to a changeset (the first snapshot of a package wins)
    pub fn record(&self, conn: &Connection, changeset_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO changeset_packages (changeset_id, package_name, snapshot)
             VALUES (?1, ?2, ?3)",
            params![changeset_id, &self.name, serde_json::to_string(self)?],
        )?;
        Ok(())
    }

    pub fn find_by_changeset(conn: &Connection, changeset_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT snapshot FROM changeset_packages WHERE changeset_id = ?1 ORDER BY package_name",
        )?;

        let raw = stmt
            .query_map([changeset_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut snapshots = Vec::with_capacity(raw.len());
        for text in raw {
            snapshots.push(serde_json::from_str(&text)?);
        }
        Ok(snapshots)
    }

    pub fn delete_by_changeset(conn: &Connection, changeset_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM changeset_packages WHERE changeset_id = ?1",
            [changeset_id],
        )?;
        Ok(())
    }

    /// Put the package row, its versions and its dependencies back
    pub fn restore(&self, conn: &Connection) -> Result<()> {
        DependencyRecord::delete_by_owner(conn, &self.name)?;

        if !self.known {
            conn.execute(
                "DELETE FROM package_versions
                 WHERE package_id IN (SELECT id FROM packages WHERE name = ?1)",
                [&self.name],
            )?;
            conn.execute("DELETE FROM packages WHERE name = ?1", [&self.name])?;
            return Ok(());
        }

        conn.execute(
            "UPDATE packages SET current_version = ?1 WHERE name = ?2",
            params![self.current_version.as_ref().map(|v| v.to_string()), &self.name],
        )?;

        if let Some(package) = InstalledPackage::find_by_name(conn, &self.name)? {
            for version in package.available_versions.difference(&self.available_versions) {
                conn.execute(
                    "DELETE FROM package_versions WHERE package_id = ?1 AND version = ?2",
                    params![package.id, version.to_string()],
                )?;
            }
        }

        for (dependency_name, range) in &self.depends {
            DependencyRecord::new(dependency_name.clone(), self.name.clone(), range.clone())
                .insert(conn)?;
        }

        Ok(())
    }
}

/// Changeset status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    RolledBack,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "rolled_back" => Ok(ChangesetStatus::RolledBack),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset records one install/upgrade/uninstall transaction
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
    pub rolled_back_at: Option<String>,
}

const CHANGESET_COLUMNS: &str = "id, description, status, created_at, applied_at, rolled_back_at";

impl Changeset {
    /// Create a new Changeset
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
            rolled_back_at: None,
        }
    }

    /// Insert this changeset into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a changeset by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM changesets WHERE id = ?1",
            CHANGESET_COLUMNS
        ))?;

        let changeset = stmt.query_row([id], Self::from_row).optional()?;

        Ok(changeset)
    }

    /// List all changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM changesets ORDER BY id DESC",
            CHANGESET_COLUMNS
        ))?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// List changesets with a given status, newest first
    pub fn find_by_status(conn: &Connection, status: ChangesetStatus) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM changesets WHERE status = ?1 ORDER BY id DESC",
            CHANGESET_COLUMNS
        ))?;

        let changesets = stmt
            .query_map([status.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// Update changeset status
    pub fn update_status(conn: &Connection, id: i64, new_status: ChangesetStatus) -> Result<()> {
        let timestamp_field = match new_status {
            ChangesetStatus::Applied => "applied_at",
            ChangesetStatus::RolledBack => "rolled_back_at",
            ChangesetStatus::Pending => "",
        };

        if !timestamp_field.is_empty() {
            conn.execute(
                &format!(
                    "UPDATE changesets SET status = ?1, {} = CURRENT_TIMESTAMP WHERE id = ?2",
                    timestamp_field
                ),
                params![new_status.as_str(), id],
            )?;
        } else {
            conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        }

        Ok(())
    }

    /// Convert a database row to a Changeset
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status: parse_column(row, 2)?,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
            rolled_back_at: row.get(5)?,
        })
    }
}
