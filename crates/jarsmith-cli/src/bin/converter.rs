use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jarsmith_cli::{exit_with, require_file, ToolConfigArgs};
use jarsmith_remap::TypeWrapperConverter;

/// Move wrapped I/O types of one or more jars into the wrapper namespace.
#[derive(Parser, Debug)]
#[command(name = "converter", version)]
struct Cli {
    /// Input jars followed by the output jar
    #[arg(value_name = "JAR", num_args = 2.., required = true)]
    paths: Vec<PathBuf>,
    #[command(flatten)]
    tool: ToolConfigArgs,
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.tool.load()?;
    let mut inputs = cli.paths;
    let output = inputs
        .pop()
        .context("expected at least one input jar and an output jar")?;
    for input in &inputs {
        require_file(input, "input jar")?;
    }

    let converter = TypeWrapperConverter::new(
        config.converter.wrapped_prefixes.iter(),
        config.converter.wrapper_namespace.as_str(),
    );
    let stats = converter
        .convert(&inputs, &output)
        .with_context(|| format!("failed to convert into {}", output.display()))?;
    tracing::info!(
        target: "jarsmith.cli",
        inputs = inputs.len(),
        classes = stats.classes_transformed,
        written = stats.entries_written,
        output = %output.display(),
        "conversion written"
    );
    Ok(())
}

fn main() -> ExitCode {
    exit_with(run(Cli::parse()))
}
