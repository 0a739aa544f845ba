//! Locate the active chat log: the newest file with the configured extension.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::TailerError;

/// Most recently created `*.{extension}` file directly under `dir`.
///
/// Falls back to the modification time on filesystems that do not record
/// creation time.  Ties are broken by file name so the choice is stable.
pub fn find_latest_log(dir: &Path, extension: &str) -> Result<PathBuf, TailerError> {
    let entries = std::fs::read_dir(dir).map_err(|source| TailerError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(stamp) = meta.created().or_else(|_| meta.modified()) else {
            continue;
        };

        let newer = match &newest {
            None => true,
            Some((best, best_path)) => (stamp, &path) > (*best, best_path),
        };
        if newer {
            newest = Some((stamp, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| TailerError::NoLogFileFound {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
