//! File Processor
//!
//! Runs one file through the pipeline:
//!
//! 1. Count the file toward the batch and mark progress as processing
//! 2. Read the input and resolve the model's token limit
//! 3. Send it whole, or split it and send the chunks in source order
//! 4. Join the chunk results and write the output
//! 5. Record the terminal status and a history entry
//!
//! A failed chunk becomes an inline error marker in the output and does not
//! stop the file. Cancellation is checked before every chunk; a file whose
//! chunk loop stops early keeps its partial output and gets no history
//! entry. A file that reaches its last chunk is recorded as completed.
//!
//! Starting a file clears a cancel left over from an earlier run. Cancel
//! only takes effect while a file is processing, so a batch cannot lose one
//! between its own cancellation check and the next file's start.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::chunker::split;
use super::client::CompletionClient;
use super::progress::{base_name, ProgressTracker, ProgressUpdate};
use super::registry::ModelRegistry;
use super::store::{ContentStore, FsContentStore};
use super::tokens::{estimate_tokens, max_tokens_per_chunk, needs_chunking};
use crate::error::{Error, Result};
use crate::models::{HistoryEntry, ProcessingStatus};

/// Placed between chunk results in the combined output
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Appended to the input's file stem to name its output
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_processed";

/// Prompt sent with chunk `part` of `total`
pub fn chunk_prompt(prompt: &str, part: usize, total: usize) -> String {
    format!("{}\n\n[Part {} of {}]", prompt, part, total)
}

/// Placeholder kept in the output for a chunk that failed
pub fn chunk_error_marker(part: usize, total: usize, error: &Error) -> String {
    format!("[Error processing part {} of {}: {}]", part, total, error)
}

/// Output path for `input` inside `output_dir`: `<stem><suffix>.<ext>`
pub fn output_path(input: &Path, output_dir: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    output_dir.join(name)
}

/// Result of one file run that did not fail
#[derive(Debug)]
struct FileRun {
    output: PathBuf,
    /// False when cancellation cut the chunk loop short
    completed: bool,
}

/// Files to run as one batch
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub prompt: String,
    pub model: String,
    pub output_suffix: String,
}

impl BatchRequest {
    pub fn new(
        inputs: Vec<PathBuf>,
        output_dir: impl Into<PathBuf>,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            inputs,
            output_dir: output_dir.into(),
            prompt: prompt.into(),
            model: model.into(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

/// How one file of a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcomeStatus {
    Completed,
    /// Cancelled mid-file; the output holds the chunks done so far
    Partial,
    Failed,
}

impl std::fmt::Display for FileOutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOutcomeStatus::Completed => write!(f, "completed"),
            FileOutcomeStatus::Partial => write!(f, "partial"),
            FileOutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: FileOutcomeStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    /// True when cancellation stopped the batch early
    pub cancelled: bool,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileOutcomeStatus::Failed)
            .count()
    }

    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileOutcomeStatus::Completed)
            .count()
    }
}

/// Composes chunker, API client and progress tracker for whole files
pub struct FileProcessor {
    registry: Arc<ModelRegistry>,
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn ContentStore>,
    progress: ProgressTracker,
}

impl FileProcessor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        client: Arc<dyn CompletionClient>,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            registry,
            client,
            store: Arc::new(FsContentStore),
            progress,
        }
    }

    /// Replace the filesystem store
    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = store;
        self
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Process one file end-to-end and return the output path
    pub async fn process_file(
        &self,
        input: &Path,
        output: &Path,
        prompt: &str,
        model: &str,
    ) -> Result<PathBuf> {
        self.run_file(input, output, prompt, model)
            .await
            .map(|run| run.output)
    }

    async fn run_file(
        &self,
        input: &Path,
        output: &Path,
        prompt: &str,
        model: &str,
    ) -> Result<FileRun> {
        let input_str = input.to_string_lossy();
        let file_name = base_name(&input_str);
        let file_number = self.progress.track_file(&input_str).await;

        let started = Instant::now();
        let start_time = Utc::now();
        self.progress
            .update(
                ProgressUpdate::new()
                    .status(ProcessingStatus::Processing)
                    .chunks(0, 0)
                    .start_time(start_time)
                    .estimated_end_time(None)
                    .clear_error()
                    .cancelled(false),
            )
            .await;
        log::info!("Processing {} (file {}) with {}", file_name, file_number, model);

        let result = self.transform(input, output, prompt, model, start_time).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(completed) => {
                if completed {
                    self.progress
                        .record_outcome(HistoryEntry {
                            file_name: file_name.clone(),
                            model: model.to_string(),
                            duration_ms,
                            timestamp: Utc::now(),
                            success: true,
                            error: None,
                        })
                        .await;
                    log::info!("Finished {} in {} ms", file_name, duration_ms);
                } else {
                    log::info!("Stopped {} after cancellation, partial output kept", file_name);
                }
                Ok(FileRun {
                    output: output.to_path_buf(),
                    completed,
                })
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Failed to process {}: {}", file_name, message);
                self.progress
                    .record_outcome(HistoryEntry {
                        file_name: file_name.clone(),
                        model: model.to_string(),
                        duration_ms,
                        timestamp: Utc::now(),
                        success: false,
                        error: Some(message.clone()),
                    })
                    .await;
                Err(Error::processing(file_name, message))
            }
        }
    }

    /// Read, transform and write. Returns false if cancelled mid-file.
    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        prompt: &str,
        model: &str,
        start_time: DateTime<Utc>,
    ) -> Result<bool> {
        let content = self.store.read_all(input).await?;

        if self.registry.lookup(model).is_none() {
            log::warn!(
                "Model {} is not in the registry, using default token limit",
                model
            );
        }
        let token_limit = self.registry.token_limit_for(model);
        let max_tokens = max_tokens_per_chunk(token_limit);

        let (text, completed) = if !needs_chunking(&content, token_limit) {
            self.progress.update(ProgressUpdate::new().chunks(1, 0)).await;
            let text = self.client.complete(&content, prompt, model).await?;
            self.progress
                .update(
                    ProgressUpdate::new()
                        .processed_chunks(1)
                        .estimated_end_time(Some(Utc::now())),
                )
                .await;
            (text, true)
        } else {
            log::info!(
                "Content of ~{} tokens exceeds {} per chunk, splitting",
                estimate_tokens(&content),
                max_tokens
            );
            self.process_chunks(&content, max_tokens, prompt, model, start_time)
                .await?
        };

        self.store.write(output, &text).await?;
        Ok(completed)
    }

    async fn process_chunks(
        &self,
        content: &str,
        max_tokens: u64,
        prompt: &str,
        model: &str,
        start_time: DateTime<Utc>,
    ) -> Result<(String, bool)> {
        let chunks = split(content, max_tokens);
        let total = chunks.len();
        self.progress
            .update(ProgressUpdate::new().chunks(total as u32, 0))
            .await;

        let mut results = Vec::with_capacity(total);
        let mut completed = true;
        for (index, chunk) in chunks.iter().enumerate() {
            let part = index + 1;
            if self.progress.is_cancelled().await {
                log::info!("Cancelled before part {} of {}", part, total);
                completed = false;
                break;
            }

            log::info!("Sending part {} of {} ({} chars)", part, total, chunk.chars().count());
            match self
                .client
                .complete(chunk, &chunk_prompt(prompt, part, total), model)
                .await
            {
                Ok(text) => results.push(text),
                // Missing endpoint or key fails every chunk the same way
                Err(e @ Error::Configuration(_)) => return Err(e),
                Err(e) => {
                    log::warn!("Part {} of {} failed: {}", part, total, e);
                    results.push(chunk_error_marker(part, total, &e));
                }
            }

            let elapsed = Utc::now() - start_time;
            let estimated_end = start_time + elapsed * total as i32 / part as i32;
            self.progress
                .update(
                    ProgressUpdate::new()
                        .processed_chunks(part as u32)
                        .estimated_end_time(Some(estimated_end)),
                )
                .await;
        }

        Ok((results.join(CHUNK_SEPARATOR), completed))
    }

    /// Process files one after another, continuing past failed files.
    ///
    /// Announces the batch to the progress tracker and stops before the next
    /// file once cancelled.
    pub async fn process_batch(&self, request: &BatchRequest) -> BatchReport {
        self.progress
            .set_total_files(request.inputs.len() as u32)
            .await;

        let mut report = BatchReport::default();
        for input in &request.inputs {
            if self.progress.is_cancelled().await {
                report.cancelled = true;
                break;
            }

            let output = output_path(input, &request.output_dir, &request.output_suffix);
            let outcome = match self
                .run_file(input, &output, &request.prompt, &request.model)
                .await
            {
                Ok(run) => FileOutcome {
                    input: input.clone(),
                    output: Some(run.output),
                    status: if run.completed {
                        FileOutcomeStatus::Completed
                    } else {
                        FileOutcomeStatus::Partial
                    },
                    error: None,
                },
                Err(e) => FileOutcome {
                    input: input.clone(),
                    output: None,
                    status: FileOutcomeStatus::Failed,
                    error: Some(e.to_string()),
                },
            };
            report.outcomes.push(outcome);
        }

        report.cancelled = report.cancelled || self.progress.is_cancelled().await;
        log::info!(
            "Batch finished: {} completed, {} failed, cancelled={}",
            report.completed(),
            report.failed(),
            report.cancelled
        );
        report
    }
}
