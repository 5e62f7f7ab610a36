//! Filesystem-backed session store
//!
//! Layout under the data folder:
//! - `sessions/<participant_id>.json`: one pretty-printed record per participant
//! - `results.csv`: append-only export of every response row
//!
//! Nothing is cached in memory. Every call reads from disk and writes back
//! before returning. `ensure` and `save_progress` hold a per-participant lock
//! across their read-merge-write sequence, so concurrent saves for one
//! participant never compute the same CSV tail twice.

pub mod csv_export;
pub mod locks;
pub mod session;

use std::path::{Path, PathBuf};
use survey_common::config::{RESULTS_CSV_NAME, SESSIONS_DIR_NAME};
use survey_common::{time, Error, Result};
use tokio::fs::File;
use tokio::io::Take;
use tracing::{debug, info, warn};

pub use csv_export::CsvLog;
pub use locks::KeyedLocks;
pub use session::{merge, sanitize_participant_id, ProgressUpdate, ResponseRecord, Session};

/// Result of a successful `save_progress`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub participant_id: String,
    /// Rows appended to the CSV export (0 when the append failed)
    pub csv_rows_appended: usize,
}

/// Session persistence rooted at an injected data folder
#[derive(Debug)]
pub struct SessionStore {
    sessions_dir: PathBuf,
    csv: CsvLog,
    locks: KeyedLocks,
}

impl SessionStore {
    /// Open (creating if needed) a store rooted at `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let sessions_dir = data_dir.join(SESSIONS_DIR_NAME);
        tokio::fs::create_dir_all(&sessions_dir).await?;

        info!("Session store at {}", data_dir.display());

        Ok(Self {
            sessions_dir,
            csv: CsvLog::new(data_dir.join(RESULTS_CSV_NAME)),
            locks: KeyedLocks::new(),
        })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn results_csv_path(&self) -> &Path {
        self.csv.path()
    }

    fn session_path(&self, participant_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{participant_id}.json"))
    }

    /// Read a stored session; missing and corrupt records both yield `None`
    async fn read_session(&self, participant_id: &str) -> Option<Session> {
        let path = self.session_path(participant_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read session {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Treating corrupt session {} as absent: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite a session record via temp file + rename
    async fn write_session(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.participant_id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn require_id(raw: &str) -> Result<String> {
        let participant_id = sanitize_participant_id(raw);
        if participant_id.is_empty() {
            return Err(Error::InvalidArgument("participant_id required".to_string()));
        }
        Ok(participant_id)
    }

    /// Create an empty session shell unless one already exists
    ///
    /// Returns the sanitized id. Never resets stored progress.
    pub async fn ensure(&self, raw_participant_id: &str) -> Result<String> {
        let participant_id = Self::require_id(raw_participant_id)?;
        let _guard = self.locks.lock(&participant_id).await;

        if self.read_session(&participant_id).await.is_none() {
            self.write_session(&Session::new(participant_id.clone(), time::now()))
                .await?;
            info!(participant_id = %participant_id, "Created session");
        }

        Ok(participant_id)
    }

    /// Fetch a stored session
    pub async fn load(&self, raw_participant_id: &str) -> Result<Session> {
        let participant_id = sanitize_participant_id(raw_participant_id);
        if participant_id.is_empty() {
            return Err(Error::NotFound("not found".to_string()));
        }

        self.read_session(&participant_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("no session for {participant_id}")))
    }

    /// Merge a partial update into the stored session and export new responses
    ///
    /// The JSON record is authoritative: a failed CSV append is logged and
    /// does not fail the call.
    pub async fn save_progress(&self, update: ProgressUpdate) -> Result<SaveReceipt> {
        let participant_id = Self::require_id(&update.participant_id)?;
        let _guard = self.locks.lock(&participant_id).await;

        let mut previous = self
            .read_session(&participant_id)
            .await
            .unwrap_or_else(|| Session::blank(participant_id.clone()));
        previous.participant_id = participant_id.clone();
        let previous_len = previous.responses.len();

        let updated = merge(previous, update, time::now());
        self.write_session(&updated).await?;

        let tail = updated.responses.get(previous_len..).unwrap_or_default();
        let csv_rows_appended = match self.csv.append(tail).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(participant_id = %participant_id, "CSV append failed: {}", e);
                0
            }
        };

        debug!(
            participant_id = %participant_id,
            index = updated.index,
            responses = updated.responses.len(),
            completed = updated.completed,
            csv_rows_appended,
            "Saved progress"
        );

        Ok(SaveReceipt {
            participant_id,
            csv_rows_appended,
        })
    }

    /// Every readable session, sorted by participant id
    ///
    /// Records that fail to parse are skipped.
    pub async fn results_json(&self) -> Result<Vec<Session>> {
        let mut entries = tokio::fs::read_dir(&self.sessions_dir)
            .await
            .map_err(|e| Error::Internal(format!("failed_to_read_results: {e}")))?;

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Internal(format!("failed_to_read_results: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<Session>(&bytes).map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            match parsed {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("Skipping unreadable session {}: {}", path.display(), e),
            }
        }

        sessions.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        Ok(sessions)
    }

    /// Open the CSV export for streaming, creating it with its header if needed.
    /// Rows appended after this call are not part of the returned reader.
    pub async fn results_csv(&self) -> Result<Take<File>> {
        self.csv
            .open_reader()
            .await
            .map_err(|e| Error::Internal(format!("failed_to_open_csv: {e}")))
    }
}
