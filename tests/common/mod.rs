// tests/common/mod.rs

//! Shared fixtures for the integration tests: a throwaway Bindery
//! installation and package archives built on the fly.

#![allow(dead_code)]

use bindery::Config;
use bindery::db;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A Bindery installation under a temporary base directory
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_base(dir.path());
        db::init(config.db_path_str().unwrap()).unwrap();
        config.ensure_dirs().unwrap();
        Self { dir, config }
    }

    pub fn conn(&self) -> rusqlite::Connection {
        db::open(self.config.db_path_str().unwrap()).unwrap()
    }

    /// Where archives are written before import
    pub fn archives(&self) -> PathBuf {
        let dir = self.dir.path().join("archives");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// On-disk location of a path in the unified root
    pub fn rooted(&self, path: &str) -> PathBuf {
        self.config.root.join(path.trim_start_matches('/'))
    }

    /// Private storage location of a file for a package version
    pub fn stored(&self, name: &str, version: &str, path: &str) -> PathBuf {
        self.config
            .install_dir
            .join(name)
            .join(version)
            .join("pkg_files")
            .join(path.trim_start_matches('/'))
    }
}

/// A package archive to build
pub struct ArchiveSpec<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub files: &'a [&'a str],
    /// `(name, minversion, maxversion)`
    pub depends: &'a [(&'a str, Option<&'a str>, Option<&'a str>)],
}

pub const NANO_FILES: &[&str] = &[
    "usr/docs/nano/documentation.txt",
    "usr/share/lib/libnano.so",
    "usr/local/reources.file",
    "bin/nano",
];

pub const VIM_FILES: &[&str] = &[
    "usr/docs/vim/documentation.txt",
    "usr/share/lib/libvim.so",
    "bin/vim",
    "lib/libvim2.so",
];

pub const EMACS_FILES: &[&str] = &[
    "usr/docs/emacs/documentation.txt",
    "usr/share/lib/libemacs.so",
    "bin/emacs",
];

pub fn nano() -> ArchiveSpec<'static> {
    ArchiveSpec { name: "nano", version: "1.3", files: NANO_FILES, depends: &[] }
}

pub fn vim() -> ArchiveSpec<'static> {
    ArchiveSpec { name: "vim", version: "4.5", files: VIM_FILES, depends: &[] }
}

pub fn emacs() -> ArchiveSpec<'static> {
    ArchiveSpec { name: "emacs", version: "1.0", files: EMACS_FILES, depends: &[] }
}

fn manifest(spec: &ArchiveSpec) -> String {
    let depends: Vec<serde_json::Value> = spec
        .depends
        .iter()
        .map(|(name, min, max)| {
            let mut dep = serde_json::json!({ "name": name });
            if let Some(min) = min {
                dep["minversion"] = serde_json::json!(min);
            }
            if let Some(max) = max {
                dep["maxversion"] = serde_json::json!(max);
            }
            dep
        })
        .collect();

    serde_json::json!({
        "name": spec.name,
        "version": spec.version,
        "depends": depends,
    })
    .to_string()
}

/// Write `<dir>/<name>-<version>.tgz` and return its path
///
/// Each file's content is its own path, so links can be checked by reading
/// through them.
pub fn write_archive(dir: &Path, spec: &ArchiveSpec) -> PathBuf {
    let top = format!("{}-{}", spec.name, spec.version);
    let manifest = manifest(spec);

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut append = |path: String, data: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data).unwrap();
    };

    append(format!("{}/MANIFEST.json", top), manifest.as_bytes());
    for file in spec.files {
        append(format!("{}/pkg_files/{}", top, file), file.as_bytes());
    }

    let encoder = builder.into_inner().unwrap();
    let path = dir.join(format!("{}.tgz", top));
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// Whether a path is a symlink (without following it)
pub fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Whether a path is a real directory (not a link to one)
pub fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}
