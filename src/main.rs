use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use bindelta::differ::BinaryDiffer;
use bindelta::ui::DiffUI;

/// Structural diff of two x86-64 binaries.
///
/// The binary stays thin: parse arguments, run the differ, render. All the
/// actual work lives in the library so it stays testable.
#[derive(Parser, Debug)]
#[command(
    name = "bindelta",
    version,
    about = "Structural diffing for x86-64 PE and ELF binaries"
)]
struct Cli {
    /// Baseline image.
    primary: PathBuf,

    /// Image to compare against the baseline.
    secondary: PathBuf,

    /// Emit the raw diff result as JSON instead of a report.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Render the report with ANSI colors.
    #[arg(long, default_value_t = false)]
    color: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let result = BinaryDiffer::new(&cli.primary, &cli.secondary)?.compare()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if cli.color {
        print!("{}", DiffUI::render_colored_report(&result));
    } else {
        print!("{}", DiffUI::render_report(&result));
    }

    Ok(())
}
