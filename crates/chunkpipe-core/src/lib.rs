//! # chunkpipe-core
//!
//! Core pipeline for chunkpipe - shared by the CLI and any other front-end.
//!
//! This crate provides:
//! - Model capability lookup (`services::registry`)
//! - Per-model sliding-window rate limiting (`services::rate_limiter`)
//! - The chat-completion client (`services::client`)
//! - Deterministic content splitting (`services::chunker`)
//! - Shared progress state with cooperative cancellation (`services::progress`)
//! - The file processor tying them together (`services::processor`)
//! - Unified error handling (`error` module)

pub mod config;
pub mod error;
pub mod models;
pub mod services;

// Re-exports for convenience
pub use config::ApiConfig;
pub use error::{Error, Result};

pub use models::{HistoryEntry, ModelDescriptor, ProcessingStatus, ProgressSnapshot};

pub use services::{
    estimate_tokens, plan, split, ApiClient, BatchReport, BatchRequest, ChunkPlan,
    CompletionClient, ContentStore, FileOutcome, FileOutcomeStatus, FileProcessor,
    FsContentStore, ModelRegistry, ProgressTracker, ProgressUpdate, RateLimiter,
    DEFAULT_TOKEN_LIMIT,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
