//! Deployment archive packing for `out`.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::context::WorkDir;
use crate::contract::CodeSource;
use crate::error::ResourceError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("{0:?} has no file name")]
    NoFileName(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk code directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write {entry:?} to archive: {source}")]
    Entry {
        entry: String,
        #[source]
        source: ZipError,
    },

    #[error("failed to finish archive: {0}")]
    Finish(#[source] ZipError),
}

impl CodeSource {
    /// Produces the zip bytes to upload, resolving paths against `work_dir`.
    pub fn load(&self, work_dir: &WorkDir) -> Result<Vec<u8>, ResourceError> {
        let archive = match self {
            Self::ZipFile(path) => work_dir.read(path)?,
            Self::Directory(path) => zip_directory(&work_dir.resolve(path))?,
            Self::File(path) => zip_file(&work_dir.resolve(path))?,
        };

        tracing::info!(
            bytes = archive.len(),
            sha256 = %archive_digest(&archive),
            "prepared code archive"
        );
        Ok(archive)
    }
}

/// Packs every non-directory entry below `root` at its relative path.
pub fn zip_directory(root: &Path) -> Result<Vec<u8>, ArchiveError> {
    let metadata = fs::metadata(root).map_err(|source| ArchiveError::Read {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ArchiveError::NotADirectory(root.to_path_buf()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path());
        add_file(&mut writer, entry.path(), &archive_name(relative))?;
    }

    finish(writer)
}

/// Packs a single file under its base name.
pub fn zip_file(path: &Path) -> Result<Vec<u8>, ArchiveError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArchiveError::NoFileName(path.to_path_buf()))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    add_file(&mut writer, path, name)?;
    finish(writer)
}

pub fn archive_digest(archive: &[u8]) -> String {
    format!("{:x}", Sha256::digest(archive))
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn add_file(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    path: &Path,
    entry: &str,
) -> Result<(), ArchiveError> {
    let contents = fs::read(path).map_err(|source| ArchiveError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(file_mode(path));
    writer
        .start_file(entry, options)
        .map_err(|source| ArchiveError::Entry {
            entry: entry.to_string(),
            source,
        })?;
    writer
        .write_all(&contents)
        .map_err(|source| ArchiveError::Entry {
            entry: entry.to_string(),
            source: ZipError::Io(source),
        })
}

fn finish(mut writer: ZipWriter<Cursor<Vec<u8>>>) -> Result<Vec<u8>, ArchiveError> {
    writer
        .finish()
        .map(Cursor::into_inner)
        .map_err(ArchiveError::Finish)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.permissions().mode() & 0o777)
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}
