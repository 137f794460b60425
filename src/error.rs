// src/error.rs

use thiserror::Error;

/// Core error types for Bindery
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors from manifests and the trace cache
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A version token that is not a dotted sequence of integers
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// No version range satisfies every request for a dependency
    #[error("Unresolvable dependency {name}: no suitable version range")]
    UnresolvableDependency { name: String },

    /// The package has no installed footprint and no cached trace
    #[error("Package {name}-{version} is not installed")]
    NotInstalled { name: String, version: String },

    /// No version of the package is currently linked
    #[error("Package not installed: {0}")]
    PackageNotFound(String),

    /// Archive extraction failed
    #[error("Failed to unpack archive: {0}")]
    Unpack(String),

    /// Package manifest missing or malformed
    #[error("Invalid package manifest: {0}")]
    Manifest(String),

    /// A binding that violates the ledger's shape invariants
    #[error("Invalid binding for {0}")]
    InvalidBinding(String),

    /// Staged bindings from an interrupted transaction are still present
    #[error("{0} staged binding(s) from an interrupted transaction; run recovery first")]
    PendingTransaction(usize),

    /// The filesystem applier could not realize a binding
    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

/// Result type alias using Bindery's Error type
pub type Result<T> = std::result::Result<T, Error>;
