//! Estimate command
//!
//! Shows the chunk plan for a file without calling the API.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_info, print_single};
use chunkpipe_core::services::is_subtitle;
use chunkpipe_core::plan;

/// Chunk plan row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct EstimateRow {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "Token Limit")]
    pub token_limit: u64,
    #[tabled(rename = "Est. Tokens")]
    pub estimated_tokens: u64,
    #[tabled(rename = "Max/Chunk")]
    pub max_tokens_per_chunk: u64,
    #[tabled(rename = "Chunks")]
    pub chunks: usize,
    #[tabled(rename = "Subtitle")]
    pub subtitle: bool,
    #[tabled(rename = "Est. Input Cost", display_with = "display_cost")]
    pub estimated_input_cost: Option<f64>,
}

fn display_cost(cost: &Option<f64>) -> String {
    match cost {
        Some(c) => format!("${:.4}", c),
        None => "-".to_string(),
    }
}

pub async fn execute(ctx: &Context, file: PathBuf, model: String) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    if ctx.registry.lookup(&model).is_none() {
        print_info(
            &format!("Model {} is not in the capability file, using the default limit", model),
            ctx.quiet,
        );
    }

    let token_limit = ctx.registry.token_limit_for(&model);
    let plan = plan(&content, token_limit);
    let row = EstimateRow {
        file: file.display().to_string(),
        estimated_input_cost: ctx.registry.estimate_cost(&model, plan.estimated_tokens, 0),
        model,
        token_limit,
        estimated_tokens: plan.estimated_tokens,
        max_tokens_per_chunk: plan.max_tokens_per_chunk,
        chunks: plan.chunk_count,
        subtitle: is_subtitle(&content),
    };

    print_single(&row, ctx.format)?;
    Ok(())
}
