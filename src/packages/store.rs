// src/packages/store.rs

//! Private package storage
//!
//! Every integrated package version keeps its payload under
//! `<install_dir>/<name>/<version>/`, with the files it contributes to the
//! unified root in `pkg_files/` and its manifest beside them. Exclusive
//! bindings point into this tree.

use crate::error::{Error, Result};
use crate::version::Version;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding the files a package contributes to the root
pub const PAYLOAD_DIR: &str = "pkg_files";

/// Package manifest file name
pub const MANIFEST_FILE: &str = "MANIFEST.json";

/// Root of a package version's private storage
pub fn private_root(install_dir: &Path, name: &str, version: &Version) -> PathBuf {
    install_dir.join(name).join(version.to_string())
}

/// Physical location backing `rootfs_path` for a package version
pub fn private_location(install_dir: &Path, name: &str, version: &Version, rootfs_path: &str) -> String {
    format!(
        "{}/{}{}",
        private_root(install_dir, name, version).display(),
        PAYLOAD_DIR,
        rootfs_path
    )
}

/// Copy an unpacked package directory into its private storage
///
/// Existing files are overwritten, so re-running an interrupted copy is safe.
pub fn install_payload(unpacked: &Path, install_dir: &Path, name: &str, version: &Version) -> Result<PathBuf> {
    let target = private_root(install_dir, name, version);
    debug!("Copying {} into {}", unpacked.display(), target.display());

    fs::create_dir_all(&target)?;
    copy_tree(unpacked, &target)?;

    Ok(target)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from)?;
    if fs::symlink_metadata(to).is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(target, to)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, _to: &Path) -> Result<()> {
    Err(Error::Filesystem(format!(
        "Symlinks in package payloads are not supported on this platform: {}",
        from.display()
    )))
}

/// Whether a package version has private storage on disk
pub fn is_stored(install_dir: &Path, name: &str, version: &Version) -> bool {
    private_root(install_dir, name, version).is_dir()
}

/// The payload directory of an unpacked or stored package
pub fn payload_dir(package_root: &Path) -> Result<PathBuf> {
    let dir = package_root.join(PAYLOAD_DIR);
    if !dir.is_dir() {
        return Err(Error::Manifest(format!(
            "{} has no {}/ directory",
            package_root.display(),
            PAYLOAD_DIR
        )));
    }
    Ok(dir)
}
