// src/packages/crawler.rs

//! Package crawler
//!
//! Traces an unpacked or stored package directory into a [`Package`]: the
//! files under `pkg_files/` become the virtual path tree and
//! `MANIFEST.json` supplies the name, version and dependencies.

use super::store::{self, MANIFEST_FILE};
use super::{Dependency, FileTree, Package};
use crate::error::{Error, Result};
use crate::version::Version;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Package manifest as stored next to the payload
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    version: Version,
    #[serde(default)]
    depends: Option<Vec<Dependency>>,
}

/// Trace a package directory into a [`Package`]
pub fn map(package_dir: &Path) -> Result<Package> {
    let manifest_path = package_dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(Error::Manifest(format!(
            "{} not found in {}",
            MANIFEST_FILE,
            package_dir.display()
        )));
    }

    let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)
        .map_err(|e| Error::Manifest(format!("{}: {}", manifest_path.display(), e)))?;

    if manifest.name.is_empty() {
        return Err(Error::Manifest(format!(
            "{}: empty package name",
            manifest_path.display()
        )));
    }

    let files = trace(&store::payload_dir(package_dir)?)?;
    debug!(
        "Traced {}-{} ({} paths)",
        manifest.name,
        manifest.version,
        files.paths().len()
    );

    Ok(Package::new(
        manifest.name,
        manifest.version,
        files,
        manifest.depends.unwrap_or_default(),
    ))
}

/// Trace a payload directory into a tree rooted at `/`
pub fn trace(payload: &Path) -> Result<FileTree> {
    let mut root = FileTree::leaf();
    root.insert("/", traverse(payload, "/")?);
    Ok(root)
}

/// `relpath` is the virtual path of `dir`, always ending in `/`
fn traverse(dir: &Path, relpath: &str) -> Result<FileTree> {
    let mut node = FileTree::leaf();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            Error::Manifest(format!("non UTF-8 file name in {}", dir.display()))
        })?;

        // Symlinks inside a payload are bound as files, never followed
        if entry.file_type()?.is_dir() {
            let child_path = format!("{}{}/", relpath, name);
            let child = traverse(&entry.path(), &child_path)?;
            node.insert(child_path, child);
        } else {
            node.insert(format!("{}{}", relpath, name), FileTree::leaf());
        }
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_package(dir: &Path, manifest: &str) {
        fs::create_dir_all(dir.join("pkg_files/usr/share/lib")).unwrap();
        fs::create_dir_all(dir.join("pkg_files/bin")).unwrap();
        fs::write(dir.join("pkg_files/bin/vim"), b"").unwrap();
        fs::write(dir.join("pkg_files/usr/share/lib/libvim.so"), b"").unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    #[test]
    fn test_map_package() {
        let dir = tempfile::tempdir().unwrap();
        write_package(
            dir.path(),
            r#"{"name": "vim", "version": "4.5",
                "depends": [{"name": "vim-libs", "minversion": "4.7", "maxversion": "4.9"},
                            {"name": "ncurses"}]}"#,
        );

        let package = map(dir.path()).unwrap();
        assert_eq!(package.name, "vim");
        assert_eq!(package.version.to_string(), "4.5");
        assert_eq!(package.depends.len(), 2);
        assert_eq!(package.depends[1].min_version, None);
        assert_eq!(
            package.files.paths(),
            vec![
                "/",
                "/bin/",
                "/bin/vim",
                "/usr/",
                "/usr/share/",
                "/usr/share/lib/",
                "/usr/share/lib/libvim.so",
            ]
        );
    }

    #[test]
    fn test_map_null_depends() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), r#"{"name": "nano", "version": "1.3", "depends": null}"#);

        let package = map(dir.path()).unwrap();
        assert!(package.depends.is_empty());
    }

    #[test]
    fn test_map_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg_files")).unwrap();
        assert!(matches!(map(dir.path()), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_map_bad_version() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), r#"{"name": "nano", "version": "one"}"#);
        assert!(matches!(map(dir.path()), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_empty_directory_is_a_leaf() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/empty")).unwrap();

        let tree = trace(dir.path()).unwrap();
        let etc = tree.get("/").unwrap().get("/etc/").unwrap();
        assert!(etc.get("/etc/empty/").unwrap().is_leaf());
    }
}
