//! Process command
//!
//! Runs a prompt over a batch of files, printing progress while the batch
//! runs. Ctrl-C cancels the batch after the in-flight request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_error, print_info, print_output, print_success};
use chunkpipe_core::config::{ENV_API_KEY, ENV_API_URL};
use chunkpipe_core::services::DEFAULT_OUTPUT_SUFFIX;
use chunkpipe_core::{
    ApiClient, ApiConfig, BatchReport, BatchRequest, FileOutcome, FileProcessor,
    ProcessingStatus, ProgressSnapshot, ProgressTracker, RateLimiter,
};

/// How often the progress printer polls the tracker
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Args)]
pub struct ProcessArgs {
    /// Input files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Prompt text sent with every file
    #[arg(short, long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Model key from the capability file
    #[arg(short, long)]
    pub model: String,

    /// Directory for the outputs
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Appended to each input's file stem to name its output
    #[arg(long, default_value = DEFAULT_OUTPUT_SUFFIX)]
    pub suffix: String,
}

/// Per-file outcome row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Output")]
    pub output: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&FileOutcome> for OutcomeRow {
    fn from(outcome: &FileOutcome) -> Self {
        Self {
            file: outcome.input.display().to_string(),
            status: outcome.status.to_string(),
            output: outcome
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            error: outcome.error.clone().unwrap_or_default(),
        }
    }
}

pub async fn execute(ctx: &Context, args: ProcessArgs) -> Result<()> {
    let prompt = resolve_prompt(args.prompt, args.prompt_file.as_ref()).await?;

    let config = ApiConfig::from_env();
    if !config.is_configured() {
        anyhow::bail!(
            "API is not configured: set {} and {}",
            ENV_API_URL,
            ENV_API_KEY
        );
    }

    if ctx.registry.lookup(&args.model).is_none() {
        print_info(
            &format!(
                "Model {} is not in {}, using the default limit",
                args.model,
                ctx.models_path.display()
            ),
            ctx.quiet,
        );
    }

    let limiter = Arc::new(RateLimiter::new(ctx.registry.clone()));
    let client = Arc::new(ApiClient::new(config, limiter));
    let tracker = ProgressTracker::new();
    let processor = FileProcessor::new(ctx.registry.clone(), client, tracker.clone());

    let mut request = BatchRequest::new(args.files, args.output_dir, prompt, args.model);
    request.output_suffix = args.suffix;
    log::debug!(
        "Writing outputs to {} with suffix {:?}",
        request.output_dir.display(),
        request.output_suffix
    );

    print_info(
        &format!(
            "Processing {} file(s) with {}",
            request.inputs.len(),
            request.model
        ),
        ctx.quiet,
    );

    let printer = tokio::spawn(print_progress(tracker.clone(), ctx.quiet));
    let interrupt = tokio::spawn(handle_interrupts(tracker.clone()));

    let report = processor.process_batch(&request).await;

    printer.abort();
    interrupt.abort();

    report_outcomes(ctx, &report)
}

fn report_outcomes(ctx: &Context, report: &BatchReport) -> Result<()> {
    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
    print_output(&rows, ctx.format)?;

    if report.cancelled {
        print_info("Batch cancelled", ctx.quiet);
    }

    let failed = report.failed();
    if failed > 0 {
        print_error(&format!(
            "{} of {} file(s) failed",
            failed,
            report.outcomes.len()
        ));
        anyhow::bail!("{} file(s) failed", failed);
    }

    print_success(
        &format!("{} file(s) completed", report.completed()),
        ctx.quiet,
    );
    Ok(())
}

async fn resolve_prompt(prompt: Option<String>, prompt_file: Option<&PathBuf>) -> Result<String> {
    let prompt = match (prompt, prompt_file) {
        (Some(p), _) => p,
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --prompt or --prompt-file is required"),
    };

    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        anyhow::bail!("Prompt is empty");
    }
    Ok(prompt)
}

/// What a Ctrl-C does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// The running file was cancelled; keep listening
    Cancelled,
    Exit,
}

fn interrupt_action(already_cancelled: bool, cancel_took_effect: bool) -> InterruptAction {
    if !already_cancelled && cancel_took_effect {
        InterruptAction::Cancelled
    } else {
        InterruptAction::Exit
    }
}

/// Handle Ctrl-C for the life of the batch.
///
/// The first one cancels the running file. A second one, or one that
/// arrives while no file is processing, exits at once since the runtime
/// has replaced the default handler.
async fn handle_interrupts(tracker: ProgressTracker) {
    let mut cancelled = false;
    while tokio::signal::ctrl_c().await.is_ok() {
        let took_effect = !cancelled && tracker.cancel().await;
        match interrupt_action(cancelled, took_effect) {
            InterruptAction::Cancelled => {
                cancelled = true;
                eprintln!("Cancelling after the current request (Ctrl-C again to exit now)...");
            }
            InterruptAction::Exit => {
                print_error("Interrupted");
                std::process::exit(130);
            }
        }
    }
}

/// Print a line whenever the tracker's counters move
async fn print_progress(tracker: ProgressTracker, quiet: bool) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut last_line = String::new();
    loop {
        interval.tick().await;
        let snapshot = tracker.snapshot().await;
        if snapshot.status != ProcessingStatus::Processing {
            continue;
        }
        let line = format_progress(&snapshot);
        if line != last_line {
            print_info(&line, quiet);
            last_line = line;
        }
    }
}

fn format_progress(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "[{}/{}] {}",
        snapshot.current_file_number,
        snapshot.total_files,
        snapshot.current_file.as_deref().unwrap_or("-")
    );
    if snapshot.total_chunks > 1 {
        line.push_str(&format!(
            "  part {}/{}",
            snapshot.processed_chunks, snapshot.total_chunks
        ));
    }
    if let Some(eta) = snapshot.estimated_end_time {
        line.push_str(&format!(
            "  eta {}",
            eta.with_timezone(&chrono::Local).format("%H:%M:%S")
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkpipe_core::FileOutcomeStatus;

    #[tokio::test]
    async fn test_format_progress_for_chunked_file() {
        let tracker = ProgressTracker::new();
        tracker.set_total_files(3).await;
        tracker.track_file("/in/movie.srt").await;
        tracker
            .update(
                chunkpipe_core::ProgressUpdate::new()
                    .status(ProcessingStatus::Processing)
                    .chunks(4, 1),
            )
            .await;

        let line = format_progress(&tracker.snapshot().await);
        assert_eq!(line, "[1/3] movie.srt  part 1/4");
    }

    #[tokio::test]
    async fn test_format_progress_single_unit_hides_parts() {
        let tracker = ProgressTracker::new();
        tracker.set_total_files(1).await;
        tracker.track_file("notes.txt").await;
        tracker
            .update(chunkpipe_core::ProgressUpdate::new().chunks(1, 0))
            .await;

        assert_eq!(format_progress(&tracker.snapshot().await), "[1/1] notes.txt");
    }

    #[tokio::test]
    async fn test_resolve_prompt_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  Translate to French\n").unwrap();

        let prompt = resolve_prompt(None, Some(&path)).await.unwrap();
        assert_eq!(prompt, "Translate to French");
    }

    #[tokio::test]
    async fn test_resolve_prompt_requires_text() {
        assert!(resolve_prompt(None, None).await.is_err());
        assert!(resolve_prompt(Some("   ".to_string()), None).await.is_err());
    }

    #[test]
    fn test_interrupt_action() {
        assert_eq!(interrupt_action(false, true), InterruptAction::Cancelled);
        // Nothing was processing
        assert_eq!(interrupt_action(false, false), InterruptAction::Exit);
        // Second Ctrl-C
        assert_eq!(interrupt_action(true, false), InterruptAction::Exit);
    }

    #[test]
    fn test_outcome_row_for_failure() {
        let outcome = FileOutcome {
            input: PathBuf::from("a.txt"),
            output: None,
            status: FileOutcomeStatus::Failed,
            error: Some("boom".to_string()),
        };
        let row = OutcomeRow::from(&outcome);
        assert_eq!(row.status, "failed");
        assert_eq!(row.output, "-");
        assert_eq!(row.error, "boom");
    }
}
