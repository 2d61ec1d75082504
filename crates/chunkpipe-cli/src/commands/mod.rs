//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod estimate;
pub mod models;
pub mod process;

use std::path::PathBuf;
use std::sync::Arc;

use crate::output::OutputFormat;
use chunkpipe_core::ModelRegistry;

/// Shared context for all commands
pub struct Context {
    pub registry: Arc<ModelRegistry>,
    /// Where the registry was loaded from
    pub models_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}
