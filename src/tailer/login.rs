//! Identify the logged-in character from the top of a log file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::classify::{login_name, LogLine};

use super::TailerError;

/// Scan `path` from the start for the first `Welcome to …, <Name>!` or
/// `Now entering …, <Name>!` line and return `<Name>`.
pub fn find_character_login(path: &Path) -> Result<Option<String>, TailerError> {
    let file = File::open(path).map_err(|source| TailerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| TailerError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        let raw = String::from_utf8_lossy(&buf);
        let Ok(line) = LogLine::split(raw.trim_end()) else {
            continue;
        };
        if let Some(name) = login_name(line.rest) {
            return Ok(Some(name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_welcome_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(
            &path,
            "2024-01-01 10:00:00 [Local] Sparky: hi\n\
             2024-01-01 10:00:01 Welcome to City of Heroes, Captain Zed!\n\
             2024-01-01 10:00:02 Now entering Atlas Park, Someone Else!\n",
        )
        .unwrap();
        assert_eq!(
            find_character_login(&path).unwrap().as_deref(),
            Some("Captain Zed")
        );
    }

    #[test]
    fn no_marker_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        std::fs::write(&path, "2024-01-01 10:00:00 [NPC] Positron: hi\n").unwrap();
        assert_eq!(find_character_login(&path).unwrap(), None);
    }

    #[test]
    fn survives_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chatlog.txt");
        let mut bytes = b"2024-01-01 10:00:00 \xff\xfe junk\n".to_vec();
        bytes.extend_from_slice(b"2024-01-01 10:00:01 Now entering Atlas Park, Zed!\n");
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(find_character_login(&path).unwrap().as_deref(), Some("Zed"));
    }
}
