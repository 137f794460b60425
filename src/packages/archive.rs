// src/packages/archive.rs

//! Package archive unpacking
//!
//! A package archive is a (usually compressed) tarball holding a single
//! top-level directory named after the archive, e.g. `vim-4.5.txz` unpacks
//! to `vim-4.5/` containing `MANIFEST.json` and `pkg_files/`.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

/// Compression format of a package archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Xz,
    Gzip,
    Zstd,
    None,
}

const EXTENSIONS: &[(&str, CompressionFormat)] = &[
    (".txz", CompressionFormat::Xz),
    (".tar.xz", CompressionFormat::Xz),
    (".tgz", CompressionFormat::Gzip),
    (".tar.gz", CompressionFormat::Gzip),
    (".tar.zst", CompressionFormat::Zstd),
    (".tar", CompressionFormat::None),
];

/// Detect compression from the file name, returning the format and the
/// archive stem (the name of its top-level directory)
pub fn detect_compression(path: &Path) -> Result<(CompressionFormat, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Unpack(format!("Invalid archive path: {}", path.display())))?;

    for (ext, format) in EXTENSIONS {
        if let Some(stem) = file_name.strip_suffix(ext) {
            if !stem.is_empty() {
                return Ok((*format, stem.to_string()));
            }
        }
    }

    Err(Error::Unpack(format!(
        "Unsupported package archive: {}. Expected .txz, .tar.xz, .tgz, .tar.gz, .tar.zst or .tar",
        file_name
    )))
}

fn open_archive(path: &Path, format: CompressionFormat) -> Result<Archive<Box<dyn Read>>> {
    let file = File::open(path)
        .map_err(|e| Error::Unpack(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader: Box<dyn Read> = match format {
        CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
        CompressionFormat::Gzip => Box::new(GzDecoder::new(file)),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(file)
                .map_err(|e| Error::Unpack(format!("Failed to create zstd decoder: {}", e)))?;
            Box::new(decoder)
        }
        CompressionFormat::None => Box::new(file),
    };

    Ok(Archive::new(reader))
}

/// Unpack a package archive into `work_dir`
///
/// Returns the unpacked package directory. Anything left at that location
/// by an earlier run is removed first, so the result holds exactly the
/// archive's contents.
pub fn unpack(archive_path: &Path, work_dir: &Path) -> Result<PathBuf> {
    let (format, stem) = detect_compression(archive_path)?;
    debug!(
        "Unpacking {} ({:?}) into {}",
        archive_path.display(),
        format,
        work_dir.display()
    );

    fs::create_dir_all(work_dir)?;

    let unpacked = work_dir.join(&stem);
    if let Ok(meta) = fs::symlink_metadata(&unpacked) {
        debug!("Removing stale {}", unpacked.display());
        if meta.is_dir() {
            fs::remove_dir_all(&unpacked)?;
        } else {
            fs::remove_file(&unpacked)?;
        }
    }

    let mut archive = open_archive(archive_path, format)?;
    archive
        .unpack(work_dir)
        .map_err(|e| Error::Unpack(format!("{}: {}", archive_path.display(), e)))?;

    if !unpacked.is_dir() {
        return Err(Error::Unpack(format!(
            "{} does not contain a top-level {}/ directory",
            archive_path.display(),
            stem
        )));
    }

    Ok(unpacked)
}
