use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use jarsmith_cli::{exit_with, require_file, ToolConfigArgs};
use jarsmith_select::{resolve_preset, ClassEntrySelector, PatternList, SelectorPreset};

/// Copy the classes of a jar selected by a top-level type pattern preset.
#[derive(Parser, Debug)]
#[command(name = "selector", version)]
struct Cli {
    /// Jar to select from
    input: PathBuf,
    /// Jar to write
    output: PathBuf,
    /// Pattern preset: `d8_desugar`, `android_fix_libs` or a `[selector.presets]` name
    #[arg(
        long = "config",
        value_name = "PRESET",
        default_value_t = SelectorPreset::default().name().to_string()
    )]
    preset: String,
    #[command(flatten)]
    tool: ToolConfigArgs,
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.tool.load()?;
    let patterns = resolve_preset(&cli.preset, &config.selector.presets)?;
    let patterns = PatternList::new(&patterns)
        .with_context(|| format!("invalid patterns in preset `{}`", cli.preset))?;
    require_file(&cli.input, "input jar")?;

    let report = ClassEntrySelector::new(patterns)
        .run(&cli.input, &cli.output)
        .with_context(|| format!("failed to select classes from {}", cli.input.display()))?;
    tracing::info!(
        target: "jarsmith.cli",
        preset = %cli.preset,
        selected = report.selected,
        written = report.transfer.entries_written,
        output = %cli.output.display(),
        "selection written"
    );
    Ok(())
}

fn main() -> ExitCode {
    exit_with(run(Cli::parse()))
}
