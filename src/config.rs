// src/config.rs

//! Storage layout
//!
//! Bindery keeps no configuration files: everything lives under one base
//! directory, plus the root directory the unified namespace is built in.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default base directory for the database and package storage
pub const DEFAULT_BASE_DIR: &str = "/var/lib/bindery";

/// Paths used by one Bindery installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Private storage, one directory per package version
    pub install_dir: PathBuf,
    /// Scratch area for unpacking archives
    pub work_dir: PathBuf,
    /// Durable package trace cache
    pub cache_dir: PathBuf,
    /// Directory the unified root is materialized in
    pub root: PathBuf,
}

impl Config {
    /// Derive every path from a base directory; the root is `<base>/root`
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            db_path: base.join("bindery.db"),
            install_dir: base.join("repo"),
            work_dir: base.join("unpack"),
            cache_dir: base.join("cache"),
            root: base.join("root"),
        }
    }

    /// Use a different directory for the unified root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// The database path as a string, as the `db` module expects
    pub fn db_path_str(&self) -> Result<&str> {
        self.db_path.to_str().ok_or_else(|| {
            Error::InitError(format!(
                "Database path is not valid UTF-8: {}",
                self.db_path.display()
            ))
        })
    }

    /// Create the storage directories (the root is created on first commit)
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.install_dir, &self.work_dir, &self.cache_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                Error::InitError(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_base(DEFAULT_BASE_DIR)
    }
}
