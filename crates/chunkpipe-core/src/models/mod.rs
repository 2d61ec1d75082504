//! Data models for chunkpipe

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability metadata for one completion model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    #[serde(default)]
    pub key: String,
    /// Maximum context size in tokens
    pub token_limit: u64,
    /// Requests per minute
    pub rpm: u32,
    /// Tokens per minute (advisory, not enforced)
    #[serde(default)]
    pub tpm: u64,
    #[serde(default)]
    pub cost_per_million_input: f64,
    #[serde(default)]
    pub cost_per_million_output: f64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ModelDescriptor {
    /// Create a descriptor with the required limits and no cost information
    pub fn new(key: impl Into<String>, token_limit: u64, rpm: u32) -> Self {
        Self {
            key: key.into(),
            token_limit,
            rpm,
            tpm: 0,
            cost_per_million_input: 0.0,
            cost_per_million_output: 0.0,
            display_name: None,
            provider: None,
        }
    }

    /// Name shown to users, falling back to the key
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }
}

/// Status of the current processing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl ProcessingStatus {
    /// Whether this status ends a file's processing
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed | ProcessingStatus::Error | ProcessingStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Idle => write!(f, "idle"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Error => write!(f, "error"),
            ProcessingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(ProcessingStatus::Idle),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "error" => Ok(ProcessingStatus::Error),
            "cancelled" | "canceled" => Ok(ProcessingStatus::Cancelled),
            _ => Err(format!("Unknown processing status: {}", s)),
        }
    }
}

/// Outcome of one file, kept in the bounded processing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub file_name: String,
    pub model: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress as reported to polling clients (no internal bookkeeping)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub status: ProcessingStatus,
    pub current_file: Option<String>,
    pub current_file_number: u32,
    pub total_files: u32,
    pub total_chunks: u32,
    pub processed_chunks: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cancelled: bool,
    pub last_updated: DateTime<Utc>,
    pub processing_history: Vec<HistoryEntry>,
    /// Seconds since the tracker was created
    pub uptime_secs: u64,
    pub current_time: DateTime<Utc>,
}
