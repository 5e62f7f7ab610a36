//! Append-only CSV log of survey responses

use serde_json::Value;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use survey_common::Result;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Take};
use tokio::sync::Mutex;
use tracing::debug;

use super::session::ResponseRecord;

/// Fixed column set, in output order
pub const CSV_COLUMNS: [&str; 8] = [
    "participant_id",
    "timestamp",
    "index",
    "manifest_index",
    "audio",
    "label",
    "filename",
    "response",
];

/// Header line including the trailing newline
pub fn header_line() -> String {
    let mut line = CSV_COLUMNS.join(",");
    line.push('\n');
    line
}

/// Quote a field when it contains a comma, double quote or newline
pub fn escape_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

/// Textual form of a record value; missing and `null` become empty
pub fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One CSV line (with trailing newline) for a response record
pub fn format_row(record: &ResponseRecord) -> String {
    let mut line = CSV_COLUMNS
        .iter()
        .map(|column| escape_field(&field_text(record.get(*column))).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Shared CSV file with a lazily written header
///
/// Appends are serialized so rows from different participants never
/// interleave mid-line.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the log for reading, writing the header first if the file does
    /// not exist yet. The reader stops at the length seen under the write
    /// lock, so it never ends partway through a row appended later.
    pub async fn open_reader(&self) -> Result<Take<File>> {
        let _guard = self.write_lock.lock().await;
        self.ensure_header_locked().await?;

        let file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        Ok(file.take(len))
    }

    async fn ensure_header_locked(&self) -> Result<()> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        file.write_all(header_line().as_bytes()).await?;
        file.flush().await?;
        debug!("Created CSV export {}", self.path.display());
        Ok(())
    }

    /// Append one row per record, returning how many rows were written
    pub async fn append(&self, records: &[ResponseRecord]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.ensure_header_locked().await?;

        if records.is_empty() {
            return Ok(0);
        }

        let payload: String = records.iter().map(format_row).collect();
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;

        Ok(records.len())
    }
}
