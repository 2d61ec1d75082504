//! Models command
//!
//! Lists the model capability file.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_info, print_output};
use chunkpipe_core::ModelDescriptor;

/// Model row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ModelRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Token Limit")]
    pub token_limit: u64,
    #[tabled(rename = "RPM")]
    pub rpm: u32,
    #[tabled(rename = "TPM")]
    pub tpm: u64,
    #[tabled(rename = "$/M In")]
    pub cost_per_million_input: f64,
    #[tabled(rename = "$/M Out")]
    pub cost_per_million_output: f64,
}

impl From<&ModelDescriptor> for ModelRow {
    fn from(model: &ModelDescriptor) -> Self {
        Self {
            key: model.key.clone(),
            name: model.label().to_string(),
            token_limit: model.token_limit,
            rpm: model.rpm,
            tpm: model.tpm,
            cost_per_million_input: model.cost_per_million_input,
            cost_per_million_output: model.cost_per_million_output,
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let rows: Vec<ModelRow> = ctx.registry.models().into_iter().map(ModelRow::from).collect();

    if rows.is_empty() {
        print_info(
            &format!("No models loaded from {}", ctx.models_path.display()),
            ctx.quiet,
        );
    }
    print_output(&rows, ctx.format)?;
    Ok(())
}
