//! [`JsonlTurnLog`]: one JSON Lines file per session.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::{HistoryError, Turn, TurnLogger};

/// Appends each turn as a single line and syncs it before returning.
///
/// The file is `<dir>/<YYYY-MM-DDTHH-MM-SS>.jsonl`, stamped with the UTC time
/// the log was opened.  Concurrent `record` calls are serialised.
#[derive(Debug)]
pub struct JsonlTurnLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTurnLog {
    /// Open a new session log in `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self, HistoryError> {
        Self::create_at(dir, Utc::now())
    }

    /// Like [`create`](Self::create) with an explicit session start time.
    pub fn create_at(dir: &Path, started: DateTime<Utc>) -> Result<Self, HistoryError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", started.format("%Y-%m-%dT%H-%M-%S")));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("turn log: {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TurnLogger for JsonlTurnLog {
    fn record(&self, turn: &Turn) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(turn)?;
        line.push('\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn read_turns(path: &Path) -> Vec<Turn> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn file_is_named_after_session_start() {
        let dir = tempdir().unwrap();
        let started = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let log = JsonlTurnLog::create_at(dir.path(), started).unwrap();

        assert_eq!(
            log.path().file_name().unwrap(),
            "2025-01-02T03-04-05.jsonl"
        );
        assert!(log.path().exists());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let log = JsonlTurnLog::create(&nested).unwrap();
        assert!(log.path().starts_with(&nested));
    }

    #[test]
    fn records_are_appended_in_order() {
        let dir = tempdir().unwrap();
        let log = JsonlTurnLog::create(dir.path()).unwrap();

        log.record(&Turn::now(1, "hello", "hi there")).unwrap();
        log.record(&Turn::now(2, "how are you", "fine")).unwrap();

        let turns = read_turns(log.path());
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].turn_id, 1);
        assert_eq!(turns[0].user_text, "hello");
        assert_eq!(turns[1].turn_id, 2);
        assert_eq!(turns[1].assistant_text, "fine");
    }

    #[test]
    fn each_line_starts_with_timestamp() {
        let dir = tempdir().unwrap();
        let log = JsonlTurnLog::create(dir.path()).unwrap();
        log.record(&Turn::now(1, "a \"quoted\"\nline", "")).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("{\"ts\":"));
    }

    #[test]
    fn concurrent_records_do_not_interleave() {
        let dir = tempdir().unwrap();
        let log = Arc::new(JsonlTurnLog::create(dir.path()).unwrap());

        let workers: Vec<_> = (0..4u64)
            .map(|w| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..25u64 {
                        log.record(&Turn::now(w * 100 + i, "x".repeat(200), "y")).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(read_turns(log.path()).len(), 100);
    }
}
