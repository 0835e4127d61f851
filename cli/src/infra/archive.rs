//! Zip handling for run logs and artifacts.
//!
//! Both endpoints return zip archives. Member paths come from the remote and
//! are only ever joined onto a destination after `enclosed_name` sanitising.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::domain::{ApiError, LogFile};

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ApiError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ApiError::Decode(format!("bad zip archive: {e}")))
}

/// Decode every `.txt` member, in archive order. Invalid UTF-8 is replaced.
///
/// # Errors
///
/// Returns `Decode` if the archive or a member is unreadable.
pub fn text_members(bytes: &[u8]) -> Result<Vec<LogFile>, ApiError> {
    let mut archive = open(bytes)?;
    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| ApiError::Decode(format!("bad zip member {index}: {e}")))?;
        if member.is_dir() || !member.name().ends_with(".txt") {
            continue;
        }
        let name = member.name().to_string();
        let mut raw = Vec::new();
        member
            .read_to_end(&mut raw)
            .map_err(|e| ApiError::Decode(format!("cannot read {name}: {e}")))?;
        files.push(LogFile {
            name,
            content: String::from_utf8_lossy(&raw).into_owned(),
        });
    }
    Ok(files)
}

/// Unpack every file member under `dest`, returning the paths written.
///
/// Members whose names would escape `dest` are skipped.
///
/// # Errors
///
/// Returns `Decode` for a corrupt archive and `Io` if writing fails.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, ApiError> {
    let mut archive = open(bytes)?;
    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| ApiError::Decode(format!("bad zip member {index}: {e}")))?;
        let Some(relative) = member.enclosed_name() else {
            tracing::warn!(name = member.name(), "skipping archive member with unsafe path");
            continue;
        };
        let target = dest.join(relative);
        if member.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_error(&target, &e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        let mut out = std::fs::File::create(&target).map_err(|e| io_error(&target, &e))?;
        std::io::copy(&mut member, &mut out).map_err(|e| io_error(&target, &e))?;
        written.push(target);
    }
    Ok(written)
}

fn io_error(path: &Path, err: &std::io::Error) -> ApiError {
    ApiError::Io(format!("{}: {err}", path.display()))
}
