use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::StoreError;

/// Returns the regular file in `dir` with the lexicographically greatest name.
///
/// CarReport names exports by date, so this is the newest one. With
/// `extension` set, only files carrying that extension are considered.
pub fn latest_snapshot(dir: &Path, extension: Option<&str>) -> Result<PathBuf, StoreError> {
    let read_dir_error = |source| StoreError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = extension {
            if path.extension() != Some(OsStr::new(ext)) {
                continue;
            }
        }
        if latest
            .as_ref()
            .map_or(true, |current| path.file_name() > current.file_name())
        {
            latest = Some(path);
        }
    }

    let latest = latest.ok_or_else(|| StoreError::EmptySnapshotDir {
        path: dir.to_path_buf(),
    })?;
    debug!("Latest snapshot in {}: {}", dir.display(), latest.display());
    Ok(latest)
}
