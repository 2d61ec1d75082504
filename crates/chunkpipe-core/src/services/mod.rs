//! Services module

pub mod chunker;
pub mod client;
pub mod processor;
pub mod progress;
pub mod rate_limiter;
pub mod registry;
pub mod store;
pub mod tokens;

pub use chunker::{is_subtitle, plan, split, ChunkPlan};
pub use client::{ApiClient, CompletionClient, DEFAULT_RETRY_AFTER_SECS};
pub use processor::{
    chunk_error_marker, chunk_prompt, output_path, BatchReport, BatchRequest, FileOutcome,
    FileOutcomeStatus, FileProcessor, CHUNK_SEPARATOR, DEFAULT_OUTPUT_SUFFIX,
};
pub use progress::{ProgressTracker, ProgressUpdate, CANCELLED_MESSAGE, MAX_HISTORY_ENTRIES};
pub use rate_limiter::{RateLimiter, WindowUsage, RATE_WINDOW};
pub use registry::{ModelRegistry, DEFAULT_TOKEN_LIMIT};
pub use store::{ContentStore, FsContentStore};
pub use tokens::{estimate_tokens, max_tokens_per_chunk, needs_chunking};
