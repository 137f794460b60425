// src/db/schema.rs

//! Database schema definitions and migrations for Bindery
//!
//! This module defines the SQLite schema for the binding ledger and the
//! installed-package tables, and provides a migration system to evolve the
//! schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::InitError(format!("Unknown migration version: {}", version))),
    }
}

/// Initial schema - Version 1
///
/// Creates the binding ledger and the package bookkeeping tables:
/// - bindings: One row per bound path with its staged commit state
/// - binding_owners: The set of packages owning each binding
/// - owner_edits: Owner-set changes made in place by the staged transaction
/// - packages: Every package ever integrated and its current version
/// - package_versions: Versions available in private storage per package
/// - dependencies: Version constraints declared by installed packages
/// - changesets: Transaction history
/// - changeset_packages: Package metadata as it was before a pending changeset
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE bindings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rootfs_path TEXT NOT NULL,
            physical_path TEXT,
            shared INTEGER NOT NULL CHECK(shared IN (0, 1)),
            commit_state TEXT NOT NULL
                CHECK(commit_state IN ('committed', 'pending_create', 'pending_delete')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- A path is bound at most once outside of pending deletes
        CREATE UNIQUE INDEX idx_bindings_active_path
            ON bindings(rootfs_path) WHERE commit_state != 'pending_delete';
        CREATE INDEX idx_bindings_commit_state ON bindings(commit_state);

        CREATE TABLE binding_owners (
            binding_id INTEGER NOT NULL,
            package_name TEXT NOT NULL,
            PRIMARY KEY (binding_id, package_name),
            FOREIGN KEY (binding_id) REFERENCES bindings(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_binding_owners_package ON binding_owners(package_name);

        -- Emptied by every commit or discard
        CREATE TABLE owner_edits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            binding_id INTEGER NOT NULL,
            package_name TEXT NOT NULL,
            added INTEGER NOT NULL CHECK(added IN (0, 1)),
            FOREIGN KEY (binding_id) REFERENCES bindings(id) ON DELETE CASCADE
        );

        -- Packages: current_version is NULL once the package is unlinked
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            current_version TEXT,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_packages_name ON packages(name);

        CREATE TABLE package_versions (
            package_id INTEGER NOT NULL,
            version TEXT NOT NULL,
            added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (package_id, version),
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        -- Dependencies: one row per (owner, dependency) pair
        CREATE TABLE dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            owner TEXT NOT NULL,
            min_version TEXT,
            max_version TEXT
        );

        CREATE INDEX idx_dependencies_name ON dependencies(name);
        CREATE INDEX idx_dependencies_owner ON dependencies(owner);

        -- Changesets: Transactional operation history
        CREATE TABLE changesets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'applied', 'rolled_back')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            applied_at TEXT,
            rolled_back_at TEXT
        );

        CREATE INDEX idx_changesets_status ON changesets(status);

        -- JSON snapshot per touched package, kept while the changeset is pending
        CREATE TABLE changeset_packages (
            changeset_id INTEGER NOT NULL,
            package_name TEXT NOT NULL,
            snapshot TEXT NOT NULL,
            PRIMARY KEY (changeset_id, package_name),
            FOREIGN KEY (changeset_id) REFERENCES changesets(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}
