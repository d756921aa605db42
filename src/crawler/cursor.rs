use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::error::CursorError;

/// Append-only offset log. Every iteration appends the next offset on its
/// own line; only the last line is authoritative. The log is never pruned,
/// so a crashed run resumes from the last offset it finished requesting.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Last recorded offset, or 0 when no log exists yet. Anything else
    /// wrong with the backing file (permissions, a non-integer last line)
    /// is an error, never a silent restart from zero.
    pub fn read_cursor(&self) -> Result<u32, CursorError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CursorError::Unreadable {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        match text.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
            None => Ok(0),
            Some(line) => line.parse().map_err(|_| CursorError::Corrupt {
                path: self.path.display().to_string(),
                line: line.to_string(),
            }),
        }
    }

    /// Durably append `current + by` and return the new offset.
    pub fn advance(&self, by: u32) -> Result<u32, CursorError> {
        let next = self.read_cursor()? + by;

        let unwritable = |e: std::io::Error| CursorError::Unwritable {
            path: self.path.display().to_string(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(unwritable)?;
        writeln!(file, "{next}").map_err(unwritable)?;
        file.sync_all().map_err(unwritable)?;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_log_defaults_to_zero() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("cursor.txt"));
        assert_eq!(store.read_cursor().unwrap(), 0);
    }

    #[test]
    fn last_line_is_authoritative() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        fs::write(&path, "0\n10\n20\n").unwrap();

        let store = CursorStore::new(&path);
        assert_eq!(store.read_cursor().unwrap(), 20);
    }

    #[test]
    fn advance_appends_and_keeps_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        let store = CursorStore::new(&path);

        assert_eq!(store.advance(10).unwrap(), 10);
        assert_eq!(store.advance(10).unwrap(), 20);
        assert_eq!(store.read_cursor().unwrap(), 20);

        let log = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, ["10", "20"]);
    }

    #[test]
    fn corrupt_last_line_fails_loudly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        fs::write(&path, "10\nnot-a-number\n").unwrap();

        let store = CursorStore::new(&path);
        let err = store.read_cursor().unwrap_err();
        assert!(matches!(err, CursorError::Corrupt { ref line, .. } if line == "not-a-number"));
    }

    #[test]
    fn trailing_blank_lines_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        fs::write(&path, "30\n\n\n").unwrap();

        let store = CursorStore::new(&path);
        assert_eq!(store.read_cursor().unwrap(), 30);
    }
}
