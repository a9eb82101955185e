//! ZIP archive handling.
//!
//! Every upload is unpacked into its own subdirectory of the configured temp
//! directory so concurrent calls never collide; [`cleanup`] is idempotent and
//! tolerates paths that are already gone.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::core::ProvodkaError;

/// Unpack `archive_bytes` into `<temp_dir>/<label>/` and return that path.
///
/// The label is expected to be unique per request (the processors derive it
/// from a request UUID). Entries are resolved through `enclosed_name` so a
/// crafted archive cannot escape the extraction directory.
///
/// # Errors
///
/// [`ProvodkaError::CorruptArchive`] when the buffer is not a valid ZIP,
/// [`ProvodkaError::Io`] when a disk write fails.
pub fn extract(
    archive_bytes: &[u8],
    temp_dir: &Path,
    label: &str,
) -> Result<PathBuf, ProvodkaError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))?;

    let extract_dir = temp_dir.join(label);
    fs::create_dir_all(&extract_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ProvodkaError::CorruptArchive(format!(
                "archive entry '{}' escapes the extraction directory",
                entry.name()
            )));
        };
        let target = extract_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        fs::write(&target, contents)?;
    }

    debug!(dir = %extract_dir.display(), "archive extracted");
    Ok(extract_dir)
}

/// Remove an extraction directory tree. Missing paths are not an error, so a
/// cleanup that races another cleanup (or a failed extraction) stays quiet.
pub fn cleanup(dir: &Path) -> Result<(), ProvodkaError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "extraction directory removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ProvodkaError::Io(e)),
    }
}
