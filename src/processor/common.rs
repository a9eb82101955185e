//! Upload validation and temp-file plumbing shared by both processors.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::ProvodkaError;

/// Reject uploads before any disk or network work: empty buffers, non-ZIP
/// file names, and files over the configured limit each produce a distinct
/// validation failure.
pub fn validate_upload(
    file_bytes: &[u8],
    filename: &str,
    max_file_size: usize,
) -> Result<(), ProvodkaError> {
    if file_bytes.is_empty() {
        return Err(ProvodkaError::Validation("the uploaded file is empty".into()));
    }
    if !filename.to_lowercase().ends_with(".zip") {
        return Err(ProvodkaError::Validation(format!(
            "only ZIP archives are accepted, got '{filename}'"
        )));
    }
    if file_bytes.len() > max_file_size {
        return Err(ProvodkaError::Validation(format!(
            "file of {} bytes exceeds the {} byte limit",
            file_bytes.len(),
            max_file_size
        )));
    }
    Ok(())
}

/// Persist the upload as `<temp_dir>/<request_id>.zip`.
pub fn save_temp_file(
    temp_dir: &Path,
    request_id: &str,
    file_bytes: &[u8],
) -> Result<PathBuf, ProvodkaError> {
    fs::create_dir_all(temp_dir)?;
    let path = temp_dir.join(format!("{request_id}.zip"));
    fs::write(&path, file_bytes)?;
    debug!(path = %path.display(), "temp file saved");
    Ok(path)
}

/// Best-effort removal of the temp ZIP; a failure here never changes the
/// processing outcome, it is only logged.
pub fn remove_temp_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "temp file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp file"),
    }
}

/// Best-effort removal of the extraction directory.
pub fn remove_extraction_dir(dir: &Path) {
    if let Err(e) = crate::archive::cleanup(dir) {
        warn!(dir = %dir.display(), error = %e, "failed to remove extraction directory");
    }
}
