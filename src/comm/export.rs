use crate::comm::message::Message;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub rows: usize,
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Header plus one row per message, every field quoted, CRLF between rows.
pub fn to_csv(log: &[Message]) -> String {
    let mut rows = Vec::with_capacity(log.len() + 1);
    rows.push(["Username", "Time", "Message"].map(quote).join(","));
    for msg in log {
        rows.push(
            [msg.username.as_str(), msg.time.as_str(), msg.message.as_str()]
                .map(quote)
                .join(","),
        );
    }
    rows.join("\r\n")
}

pub fn export_filename(at: DateTime<Local>) -> String {
    format!("comm_history_{}.csv", at.format("%Y-%m-%d_%H%M%S"))
}

pub fn write_export(dir: &Path, log: &[Message]) -> Result<ExportOutcome> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(export_filename(Local::now()));
    fs::write(&path, to_csv(log))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(ExportOutcome {
        path,
        rows: log.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn csv_quotes_every_field_and_doubles_quotes() {
        let log = vec![
            Message::authored("Alice", "3:45 PM", "said \"hi\""),
            Message::system("line one\nline two"),
        ];
        assert_eq!(
            to_csv(&log),
            "\"Username\",\"Time\",\"Message\"\r\n\"Alice\",\"3:45 PM\",\"said \"\"hi\"\"\"\r\n\"SYSTEM\",\"\",\"line one\nline two\""
        );
    }

    #[test]
    fn empty_log_exports_header_only() {
        assert_eq!(to_csv(&[]), "\"Username\",\"Time\",\"Message\"");
    }

    #[test]
    fn filename_uses_local_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).single().expect("time");
        assert_eq!(export_filename(at), "comm_history_2024-03-09_070502.csv");
    }

    #[test]
    fn write_export_creates_file() {
        let tmp = tempdir().expect("tempdir");
        let out = write_export(&tmp.path().join("exports"), &[Message::system("x")]).expect("export");
        assert_eq!(out.rows, 1);
        let body = fs::read_to_string(&out.path).expect("read");
        assert!(body.ends_with("\"SYSTEM\",\"\",\"x\""));
    }
}
