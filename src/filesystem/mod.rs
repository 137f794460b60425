// src/filesystem/mod.rs

//! Filesystem appliers
//!
//! The ledger decides what the unified root should look like; an applier
//! makes the disk match when the ledger commits. Exclusive bindings become
//! symlinks into package storage, shared bindings become real directories.
//!
//! Commits may be retried after a crash, so both operations must accept a
//! target that is already in the requested state.

use crate::db::models::Binding;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Realizes committed ledger changes on disk
pub trait FilesystemApplier {
    /// Remove whatever backs the binding's path; absent targets are fine
    fn remove(&self, binding: &Binding) -> Result<()>;

    /// Create the link or directory for the binding; present targets are fine
    fn create(&self, binding: &Binding) -> Result<()>;
}

/// Applier that leaves the disk untouched (ledger-only operation)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullApplier;

impl FilesystemApplier for NullApplier {
    fn remove(&self, _binding: &Binding) -> Result<()> {
        Ok(())
    }

    fn create(&self, _binding: &Binding) -> Result<()> {
        Ok(())
    }
}

/// Applier that materializes bindings under a root directory
#[derive(Debug, Clone)]
pub struct RootfsApplier {
    root: PathBuf,
}

impl RootfsApplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a virtual path (`/` is the root itself)
    pub fn target(&self, rootfs_path: &str) -> PathBuf {
        let relative = rootfs_path.trim_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Whether any directory between the root (inclusive) and `target` is a symlink
    ///
    /// Such a target lives inside package storage, not in the unified root.
    fn behind_symlink(&self, target: &Path) -> bool {
        let Ok(relative) = target.strip_prefix(&self.root) else {
            return false;
        };

        let mut current = self.root.clone();
        if is_symlink(&current) {
            return true;
        }

        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            current.push(component);
            if is_symlink(&current) {
                return true;
            }
        }
        false
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn fs_error(action: &str, path: &Path, e: io::Error) -> Error {
    Error::Filesystem(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl FilesystemApplier for RootfsApplier {
    fn remove(&self, binding: &Binding) -> Result<()> {
        let target = self.target(&binding.rootfs_path);

        if target != self.root && self.behind_symlink(&target) {
            trace!("{} is already outside the root, nothing to remove", target.display());
            return Ok(());
        }

        let file_type = match fs::symlink_metadata(&target) {
            Ok(m) => m.file_type(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(fs_error("inspect", &target, e)),
        };

        // Only the binding's own kind of artifact is removed. Anything else at
        // the path was put there by a replacement binding in an earlier,
        // interrupted commit.
        match (&binding.physical_path, file_type.is_symlink(), file_type.is_dir()) {
            (Some(_), true, _) => {
                debug!("Removing link {}", target.display());
                fs::remove_file(&target).map_err(|e| fs_error("remove", &target, e))
            }
            (None, false, true) => {
                debug!("Removing shared directory {}", target.display());
                fs::remove_dir(&target).map_err(|e| fs_error("remove directory", &target, e))
            }
            _ => {
                trace!("{} no longer backs {}, leaving it", target.display(), binding.rootfs_path);
                Ok(())
            }
        }
    }

    fn create(&self, binding: &Binding) -> Result<()> {
        let target = self.target(&binding.rootfs_path);

        match &binding.physical_path {
            None => {
                if is_symlink(&target) {
                    return Err(Error::Filesystem(format!(
                        "{} is a link, expected a shared directory",
                        target.display()
                    )));
                }
                if target.is_dir() {
                    return Ok(());
                }
                debug!("Creating shared directory {}", target.display());
                fs::create_dir_all(&target).map_err(|e| fs_error("create directory", &target, e))
            }
            Some(physical) => {
                if let Ok(existing) = fs::read_link(&target) {
                    if existing == Path::new(physical) {
                        return Ok(());
                    }
                    fs::remove_file(&target).map_err(|e| fs_error("replace link", &target, e))?;
                } else if target == self.root && is_empty_dir(&target) {
                    // A lone package owns the whole root
                    fs::remove_dir(&target).map_err(|e| fs_error("replace root", &target, e))?;
                } else if fs::symlink_metadata(&target).is_ok() {
                    return Err(Error::Filesystem(format!(
                        "{} exists and is not a link",
                        target.display()
                    )));
                }

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| fs_error("create directory", parent, e))?;
                }

                debug!("Linking {} -> {}", target.display(), physical);
                symlink(Path::new(physical), &target)
            }
        }
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link).map_err(|e| fs_error("link", link, e))
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let result = if original.is_dir() {
        symlink_dir(original, link)
    } else {
        symlink_file(original, link)
    };
    result.map_err(|e| fs_error("link", link, e))
}
