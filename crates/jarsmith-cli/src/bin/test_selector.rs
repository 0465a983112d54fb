use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jarsmith_cli::{exit_with, require_file, ToolConfigArgs};
use jarsmith_remap::TestJarSelector;

/// Drop test classes already shipped in the desugared library and relocate
/// the test-only library types they reference.
#[derive(Parser, Debug)]
#[command(name = "test-selector", version)]
struct Cli {
    /// Output of `selector`
    desugar_jar: PathBuf,
    /// Test jar to filter
    test_input: PathBuf,
    /// Jar to write
    test_output: PathBuf,
    #[command(flatten)]
    tool: ToolConfigArgs,
}

fn run(cli: Cli) -> Result<()> {
    cli.tool.load()?;
    require_file(&cli.desugar_jar, "desugared library jar")?;
    require_file(&cli.test_input, "test jar")?;

    let selector = TestJarSelector::scan(&cli.desugar_jar, &cli.test_input)
        .context("failed to index the input jars")?;
    let stats = selector
        .run(&cli.test_input, &cli.test_output)
        .with_context(|| format!("failed to write {}", cli.test_output.display()))?;
    tracing::info!(
        target: "jarsmith.cli",
        written = stats.entries_written,
        dropped = stats.entries_dropped,
        output = %cli.test_output.display(),
        "test jar written"
    );
    Ok(())
}

fn main() -> ExitCode {
    exit_with(run(Cli::parse()))
}
