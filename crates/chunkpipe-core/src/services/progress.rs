//! Progress Tracker
//!
//! Process-wide record of the current job, shared between the sequential
//! worker that mutates it and any number of readers polling snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  update / track_file   ┌──────────────────────────┐
//! │ FileProcessor│ ─────────────────────▶ │ Arc<RwLock<ProgressState>>│
//! └──────────────┘                        └──────────────────────────┘
//!                                            ▲              ▲
//!                               snapshot()   │              │  cancel()
//!                                     ┌──────┴─────┐  ┌─────┴──────┐
//!                                     │ pollers    │  │ Ctrl-C / UI│
//!                                     └────────────┘  └────────────┘
//! ```
//!
//! Writers hold the lock only while merging fields, never across an API
//! call, so a snapshot read never waits on the worker's network I/O.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{HistoryEntry, ProcessingStatus, ProgressSnapshot};

/// Entries kept in the processing history
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Error message recorded when a job is cancelled
pub const CANCELLED_MESSAGE: &str = "Processing cancelled by user";

// ============================================================================
// State
// ============================================================================

#[derive(Debug)]
struct ProgressState {
    status: ProcessingStatus,
    current_file: Option<String>,
    current_file_number: u32,
    total_files: u32,
    total_chunks: u32,
    processed_chunks: u32,
    start_time: Option<DateTime<Utc>>,
    estimated_end_time: Option<DateTime<Utc>>,
    error: Option<String>,
    cancelled: bool,
    last_updated: DateTime<Utc>,
    processing_history: VecDeque<HistoryEntry>,
    /// Base names already counted toward `current_file_number`
    seen_files: HashSet<String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            status: ProcessingStatus::Idle,
            current_file: None,
            current_file_number: 0,
            total_files: 0,
            total_chunks: 0,
            processed_chunks: 0,
            start_time: None,
            estimated_end_time: None,
            error: None,
            cancelled: false,
            last_updated: Utc::now(),
            processing_history: VecDeque::new(),
            seen_files: HashSet::new(),
        }
    }
}

impl ProgressState {
    /// Merge an update. The only place fields change after a reset.
    fn apply(&mut self, update: ProgressUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(current_file) = update.current_file {
            self.current_file = current_file;
        }
        if let Some(total_files) = update.total_files {
            self.total_files = total_files;
        }
        if let Some(number) = update.current_file_number {
            self.current_file_number = number.max(self.current_file_number).min(self.total_files);
        }
        match (update.total_chunks, update.processed_chunks) {
            // New file: both counters are set together and may go back to zero
            (Some(total), processed) => {
                self.total_chunks = total;
                self.processed_chunks = processed.unwrap_or(0).min(total);
            }
            (None, Some(processed)) => {
                self.processed_chunks = processed
                    .max(self.processed_chunks)
                    .min(self.total_chunks);
            }
            (None, None) => {}
        }
        if let Some(start_time) = update.start_time {
            self.start_time = start_time;
        }
        if let Some(estimated_end_time) = update.estimated_end_time {
            self.estimated_end_time = estimated_end_time;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(cancelled) = update.cancelled {
            self.cancelled = cancelled;
        }
        self.last_updated = Utc::now();
    }
}

// ============================================================================
// Partial updates
// ============================================================================

/// Fields to merge into the progress state; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub status: Option<ProcessingStatus>,
    pub current_file: Option<Option<String>>,
    pub current_file_number: Option<u32>,
    pub total_files: Option<u32>,
    pub total_chunks: Option<u32>,
    pub processed_chunks: Option<u32>,
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub estimated_end_time: Option<Option<DateTime<Utc>>>,
    pub error: Option<Option<String>>,
    pub cancelled: Option<bool>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ProcessingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Start counting chunks for a new file
    pub fn chunks(mut self, total: u32, processed: u32) -> Self {
        self.total_chunks = Some(total);
        self.processed_chunks = Some(processed);
        self
    }

    pub fn processed_chunks(mut self, processed: u32) -> Self {
        self.processed_chunks = Some(processed);
        self
    }

    pub fn start_time(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = Some(Some(at));
        self
    }

    pub fn estimated_end_time(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.estimated_end_time = Some(at);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = Some(cancelled);
        self
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Shared handle to the progress state. Clones refer to the same state.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
    created_at: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ProgressState::default())),
            created_at: Instant::now(),
        }
    }

    /// Return to the idle baseline, dropping counters, history and seen files
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = ProgressState::default();
    }

    /// Announce a new batch of `total` files
    pub async fn set_total_files(&self, total: u32) {
        let mut state = self.state.write().await;
        *state = ProgressState::default();
        state.apply(ProgressUpdate {
            total_files: Some(total),
            ..Default::default()
        });
    }

    /// Merge `update` into the current state
    pub async fn update(&self, update: ProgressUpdate) {
        self.state.write().await.apply(update);
    }

    /// Count a file toward the batch, once per base name.
    ///
    /// Returns the file's ordinal; repeated calls for the same name return
    /// the current number without incrementing.
    pub async fn track_file(&self, path: &str) -> u32 {
        let name = base_name(path);
        let mut state = self.state.write().await;

        if !state.seen_files.insert(name.clone()) {
            return state.current_file_number;
        }

        let next = state.current_file_number + 1;
        state.apply(ProgressUpdate {
            current_file: Some(Some(name)),
            current_file_number: Some(next),
            ..Default::default()
        });
        state.current_file_number
    }

    /// Cancel the running job.
    ///
    /// Only takes effect while processing; returns whether it did.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.write().await;
        if state.status != ProcessingStatus::Processing {
            log::debug!("Ignoring cancel request while {}", state.status);
            return false;
        }

        state.apply(ProgressUpdate {
            status: Some(ProcessingStatus::Cancelled),
            error: Some(Some(CANCELLED_MESSAGE.to_string())),
            cancelled: Some(true),
            ..Default::default()
        });
        log::info!("Processing cancelled");
        true
    }

    pub async fn is_cancelled(&self) -> bool {
        self.state.read().await.cancelled
    }

    /// Append a history entry, evicting the oldest beyond the bound
    pub async fn push_history(&self, entry: HistoryEntry) {
        let mut state = self.state.write().await;
        push_bounded(&mut state.processing_history, entry);
        state.apply(ProgressUpdate::default());
    }

    /// Set a file's terminal status and record it in the history.
    ///
    /// A file that ran to the end is recorded as completed even when a
    /// cancel arrived during its last request; the `cancelled` flag stays
    /// set so a batch still stops before the next file.
    pub async fn record_outcome(&self, entry: HistoryEntry) {
        let mut state = self.state.write().await;
        let update = if entry.success {
            ProgressUpdate::new().status(ProcessingStatus::Completed)
        } else {
            let message = entry.error.clone().unwrap_or_else(|| "Unknown error".to_string());
            ProgressUpdate::new().status(ProcessingStatus::Error).error(message)
        };
        push_bounded(&mut state.processing_history, entry);
        state.apply(update);
    }

    /// Copy of the current state for reporting
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read().await;
        ProgressSnapshot {
            status: state.status,
            current_file: state.current_file.clone(),
            current_file_number: state.current_file_number,
            total_files: state.total_files,
            total_chunks: state.total_chunks,
            processed_chunks: state.processed_chunks,
            start_time: state.start_time,
            estimated_end_time: state.estimated_end_time,
            error: state.error.clone(),
            cancelled: state.cancelled,
            last_updated: state.last_updated,
            processing_history: state.processing_history.iter().cloned().collect(),
            uptime_secs: self.created_at.elapsed().as_secs(),
            current_time: Utc::now(),
        }
    }
}

fn push_bounded(history: &mut VecDeque<HistoryEntry>, entry: HistoryEntry) {
    history.push_back(entry);
    while history.len() > MAX_HISTORY_ENTRIES {
        history.pop_front();
    }
}

/// File name component of a path, or the path itself
pub fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
