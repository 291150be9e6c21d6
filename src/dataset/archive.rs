//! Dataset archive extraction
//!
//! The labeled dataset ships as a zip archive containing a `CovidDataset/`
//! tree with `Train/` and `Val/` splits.

use std::fs::File;
use std::path::Path;

use tracing::info;
use zip::ZipArchive;

use crate::utils::error::{Result, XrayError};

/// Summary of an extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Number of regular files written
    pub files: usize,
    /// Number of directory entries in the archive
    pub directories: usize,
}

/// Unpack `archive` into `dest`
///
/// Entries whose names would escape `dest` make the whole extraction fail.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<ExtractionSummary> {
    if !archive.is_file() {
        return Err(XrayError::PathNotFound(archive.to_path_buf()));
    }

    info!("Extracting {:?} into {:?}", archive, dest);

    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| XrayError::Dataset(format!("Invalid archive {:?}: {}", archive, e)))?;

    let mut summary = ExtractionSummary {
        files: 0,
        directories: 0,
    };
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| XrayError::Dataset(format!("Corrupt archive entry {}: {}", i, e)))?;
        if entry.enclosed_name().is_none() {
            return Err(XrayError::Dataset(format!(
                "Archive entry escapes the destination: {}",
                entry.name()
            )));
        }
        if entry.is_dir() {
            summary.directories += 1;
        } else {
            summary.files += 1;
        }
    }

    std::fs::create_dir_all(dest)?;
    zip.extract(dest)
        .map_err(|e| XrayError::Dataset(format!("Failed to extract {:?}: {}", archive, e)))?;

    info!(
        "Extracted {} files ({} directories)",
        summary.files, summary.directories
    );

    Ok(summary)
}
