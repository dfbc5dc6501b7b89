//! Zip archive extraction into a scoped temporary directory.
//!
//! The directory lives as long as the [`ExtractedArchive`]; dropping it
//! removes every extracted file, whether loading succeeded or not.

use std::{
    fs::{self, File},
    io::{self, Cursor, Read, Seek},
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Not a valid zip archive: {0}")]
    BadArchive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Check if a path is a ZIP file.
pub fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Skip hidden files and macOS metadata.
fn is_candidate_entry(name: &str) -> bool {
    let lower = name.to_lowercase();
    !(lower.contains("__macosx") || lower.contains("/.") || lower.starts_with('.'))
}

#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl ExtractedArchive {
    /// Extract a zip file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        log::info!("Opening ZIP file: {:?}", path);
        let file = File::open(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.zip");
        Self::extract(file, name)
    }

    /// Extract a zip archive held in memory.
    pub fn from_bytes(data: &[u8], name: &str) -> Result<Self, ArchiveError> {
        log::info!("Extracting ZIP '{}' ({} bytes)", name, data.len());
        Self::extract(Cursor::new(data), name)
    }

    /// Root of the extracted tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Extracted regular files, sorted by path.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn extract<R: Read + Seek>(reader: R, archive_name: &str) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(reader)?;
        let dir = tempfile::Builder::new()
            .prefix("dicom-quadview-")
            .tempdir()?;
        Self::extract_into(archive, dir, archive_name)
    }

    /// Unpack into `dir`. On error `dir` is dropped together with whatever
    /// was written so far.
    fn extract_into<R: Read + Seek>(
        mut archive: ZipArchive<R>,
        dir: TempDir,
        archive_name: &str,
    ) -> Result<Self, ArchiveError> {
        let mut files = Vec::new();

        log::debug!("ZIP '{}' contains {} entries", archive_name, archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                log::trace!("Skipping directory: {}", name);
                continue;
            }
            if !is_candidate_entry(&name) {
                log::trace!("Skipping hidden entry: {}", name);
                continue;
            }
            let Some(relative) = entry.enclosed_name() else {
                log::warn!("Skipping entry outside the archive root: {}", name);
                continue;
            };

            let target = dir.path().join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            files.push(target);
        }

        files.sort();
        log::info!(
            "Extracted {} files from ZIP '{}' into {:?}",
            files.len(),
            archive_name,
            dir.path()
        );

        Ok(Self { dir, files })
    }
}
