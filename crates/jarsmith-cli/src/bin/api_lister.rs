use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jarsmith_apianalyzer::list_desugared_apis;
use jarsmith_cli::{exit_with, require_file, ToolConfigArgs};

/// Print the public methods of a desugared library jar, one CSV row each:
/// `class,name,descriptor,api_class,api_name,api_descriptor`.
#[derive(Parser, Debug)]
#[command(name = "api-lister", version)]
struct Cli {
    /// Desugared library jar, e.g. `desugar_jdk_libs.jar`
    input: PathBuf,
    #[command(flatten)]
    tool: ToolConfigArgs,
}

fn run(cli: Cli) -> Result<()> {
    cli.tool.load()?;
    require_file(&cli.input, "input jar")?;

    let records = list_desugared_apis(&cli.input)
        .with_context(|| format!("failed to list {}", cli.input.display()))?;
    let mut out = std::io::stdout().lock();
    for record in &records {
        writeln!(out, "{record}").context("failed to write to stdout")?;
    }
    out.flush().context("failed to write to stdout")?;
    tracing::info!(
        target: "jarsmith.cli",
        methods = records.len(),
        "api list written"
    );
    Ok(())
}

fn main() -> ExitCode {
    exit_with(run(Cli::parse()))
}
