//! Append-only termination log (CSV table plus JSON lines)

use proctor_api::TerminationEvent;
use proctor_util::{format_timestamp_secs, round_centis, SessionId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::{StoreError, StoreResult, TerminationSink};

pub const CSV_FILENAME: &str = "afk_events.csv";
pub const JSONL_FILENAME: &str = "afk_events.jsonl";

/// CSV column order
pub const CSV_COLUMNS: [&str; 15] = [
    "timestamp",
    "reason",
    "face_violation_count",
    "no_face",
    "multi_human",
    "unknown_present",
    "gaze_left",
    "gaze_right",
    "gaze_up",
    "gaze_total",
    "iris_total",
    "phone_present",
    "last_gaze_state",
    "elapsed_gaze_sec",
    "fps",
];

/// One flattened termination record as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationRecord {
    pub session_id: String,
    pub timestamp: String,
    pub reason: String,
    pub face_violation_count: u32,
    pub no_face: bool,
    pub multi_human: bool,
    pub unknown_present: bool,
    pub gaze_left: u32,
    pub gaze_right: u32,
    pub gaze_up: u32,
    pub gaze_total: u32,
    pub iris_total: u32,
    pub phone_present: bool,
    pub last_gaze_state: String,
    pub elapsed_gaze_sec: f64,
    pub fps: u32,
}

impl TerminationRecord {
    pub fn new(session_id: &SessionId, event: &TerminationEvent) -> Self {
        let s = &event.summary;
        Self {
            session_id: session_id.to_string(),
            timestamp: format_timestamp_secs(&event.at),
            reason: event.reason.as_str().to_string(),
            face_violation_count: s.face_violation_count,
            no_face: s.no_face,
            multi_human: s.multi_human,
            unknown_present: s.unknown_present,
            gaze_left: s.gaze_left,
            gaze_right: s.gaze_right,
            gaze_up: s.gaze_up,
            gaze_total: s.gaze_total,
            iris_total: s.iris_total,
            phone_present: s.phone_present,
            last_gaze_state: s.last_gaze_state.label().to_string(),
            elapsed_gaze_sec: round_centis(s.elapsed_gaze_sec),
            fps: s.fps,
        }
    }

    /// Render as a CSV row (without trailing newline)
    pub fn csv_row(&self) -> String {
        let flag = |b: bool| if b { "1" } else { "0" };
        [
            csv_field(&self.timestamp),
            csv_field(&self.reason),
            self.face_violation_count.to_string(),
            flag(self.no_face).to_string(),
            flag(self.multi_human).to_string(),
            flag(self.unknown_present).to_string(),
            self.gaze_left.to_string(),
            self.gaze_right.to_string(),
            self.gaze_up.to_string(),
            self.gaze_total.to_string(),
            self.iris_total.to_string(),
            flag(self.phone_present).to_string(),
            csv_field(&self.last_gaze_state),
            format!("{:.2}", self.elapsed_gaze_sec),
            self.fps.to_string(),
        ]
        .join(",")
    }
}

/// Commas would shift columns; line breaks would split records.
fn csv_field(value: &str) -> String {
    value.replace([',', '\n', '\r'], " ")
}

/// Termination log backed by two files in one directory
pub struct FileTerminationLog {
    csv_path: PathBuf,
    jsonl_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTerminationLog {
    /// Use `dir` for the log files, creating it if needed
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            csv_path: dir.join(CSV_FILENAME),
            jsonl_path: dir.join(JSONL_FILENAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    fn append(path: &Path) -> StoreResult<File> {
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }
}

impl TerminationSink for FileTerminationLog {
    fn record(&self, session_id: &SessionId, event: &TerminationEvent) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let record = TerminationRecord::new(session_id, event);

        let mut csv = Self::append(&self.csv_path)?;
        if csv.metadata()?.len() == 0 {
            writeln!(csv, "{}", CSV_COLUMNS.join(","))?;
        }
        writeln!(csv, "{}", record.csv_row())?;

        let mut jsonl = Self::append(&self.jsonl_path)?;
        writeln!(jsonl, "{}", serde_json::to_string(&record)?)?;

        debug!(
            session_id = %session_id,
            reason = %event.reason,
            path = %self.csv_path.display(),
            "Termination recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use proctor_api::{GazeDirection, TerminationReason, ViolationSummary};

    fn event(reason: TerminationReason) -> TerminationEvent {
        TerminationEvent {
            reason,
            summary: ViolationSummary {
                face_violation_count: 4,
                no_face: true,
                multi_human: false,
                unknown_present: false,
                gaze_left: 1,
                gaze_right: 2,
                gaze_up: 0,
                gaze_total: 3,
                iris_total: 7,
                phone_present: false,
                last_gaze_state: GazeDirection::Right,
                elapsed_gaze_sec: 1.234,
                fps: 29,
            },
            at: Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileTerminationLog::open(dir.path()).unwrap();
        let id = SessionId::new("exam-1");

        log.record(&id, &event(TerminationReason::FaceProctoring)).unwrap();
        log.record(&id, &event(TerminationReason::GazeAway)).unwrap();

        let content = fs::read_to_string(log.csv_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,reason,"));
        assert_eq!(content.matches("timestamp,reason").count(), 1);
        assert!(lines[2].contains(",gaze_away,"));
    }

    #[test]
    fn csv_row_formatting() {
        let record = TerminationRecord::new(
            &SessionId::new("exam-1"),
            &event(TerminationReason::FaceProctoring),
        );
        let row = record.csv_row();
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols.len(), CSV_COLUMNS.len());
        assert_eq!(cols[1], "face_proctoring");
        assert_eq!(cols[3], "1");
        assert_eq!(cols[4], "0");
        assert_eq!(cols[12], "Looking Right");
        assert_eq!(cols[13], "1.23");
        assert_eq!(cols[14], "29");
    }

    #[test]
    fn commas_are_replaced() {
        assert_eq!(csv_field("a,b\nc"), "a b c");
    }

    #[test]
    fn jsonl_carries_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileTerminationLog::open(dir.path().join("nested")).unwrap();

        log.record(&SessionId::new("exam-7"), &event(TerminationReason::IrisMismatch))
            .unwrap();

        let content = fs::read_to_string(log.jsonl_path()).unwrap();
        let record: TerminationRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record.session_id, "exam-7");
        assert_eq!(record.reason, "iris_mismatch");
        assert_eq!(record.iris_total, 7);
    }

    #[test]
    fn existing_files_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new("exam-1");

        FileTerminationLog::open(dir.path())
            .unwrap()
            .record(&id, &event(TerminationReason::DeviceMobile))
            .unwrap();
        FileTerminationLog::open(dir.path())
            .unwrap()
            .record(&id, &event(TerminationReason::DeviceMobile))
            .unwrap();

        let csv = fs::read_to_string(dir.path().join(CSV_FILENAME)).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let jsonl = fs::read_to_string(dir.path().join(JSONL_FILENAME)).unwrap();
        assert_eq!(jsonl.lines().count(), 2);
    }
}
