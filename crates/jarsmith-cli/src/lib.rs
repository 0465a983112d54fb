//! Shared plumbing for the jarsmith binaries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Args;
use jarsmith_config::ToolConfig;

/// Exit status for every failed run.
pub const FAILURE_EXIT_CODE: u8 = 2;

#[derive(Args, Debug, Clone, Default)]
pub struct ToolConfigArgs {
    /// TOML tool configuration (defaults to `$JARSMITH_CONFIG` when set)
    #[arg(long, value_name = "PATH")]
    pub tool_config: Option<PathBuf>,
}

impl ToolConfigArgs {
    /// Loads the tool configuration and installs the tracing subscriber.
    pub fn load(&self) -> Result<ToolConfig> {
        let config = ToolConfig::load(self.tool_config.as_deref())
            .context("failed to load tool configuration")?;
        jarsmith_config::init_tracing(&config.logging);
        Ok(config)
    }
}

/// Argument check performed before any archive is opened.
pub fn require_file(path: &Path, role: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{role} {} does not exist or is not a file", path.display());
    }
    Ok(())
}

pub fn exit_with(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}
