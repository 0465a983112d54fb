use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jarsmith_apianalyzer::{write_text_digest, ClassDigestGenerator};
use jarsmith_cli::{exit_with, require_file, ToolConfigArgs};

/// Write the text digest of the platform types of a jar.
#[derive(Parser, Debug)]
#[command(name = "generator", version)]
struct Cli {
    /// Platform jar, e.g. `android.jar`
    input: PathBuf,
    /// Text digest to write
    output: PathBuf,
    #[command(flatten)]
    tool: ToolConfigArgs,
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.tool.load()?;
    require_file(&cli.input, "input jar")?;

    let generator =
        ClassDigestGenerator::with_package_prefixes(config.generator.package_prefixes.iter());
    let collection = generator
        .read(&cli.input)
        .with_context(|| format!("failed to digest {}", cli.input.display()))?;
    write_text_digest(&collection, &cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    tracing::info!(
        target: "jarsmith.cli",
        classes = collection.len(),
        output = %cli.output.display(),
        "digest written"
    );
    Ok(())
}

fn main() -> ExitCode {
    exit_with(run(Cli::parse()))
}
