mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::discover::DiscoverArgs;
use commands::generate::GenerateArgs;
use commands::periods::PeriodsArgs;

/// Deal-model generation from structured assumptions
#[derive(Parser)]
#[command(
    name = "dealmodel",
    version,
    about = "Generate dependency-linked deal models from structured assumptions",
    long_about = "Compiles deal assumptions into a five-sheet financial model \
                  (Assumptions, Projections, CapEx, Debt Model, FCF) with linked \
                  spreadsheet formulas, an interest-only debt schedule, and \
                  IRR/MOIC/NPV return metrics at decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the full five-sheet model from a deal input
    Generate(GenerateArgs),
    /// Count and label the operating periods for a date range
    Periods(PeriodsArgs),
    /// Locate known rows in a dumped workbook by label scanning
    Discover(DiscoverArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Minimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Generate(args) => commands::generate::run_generate(args),
        Commands::Periods(args) => commands::periods::run_periods(args),
        Commands::Discover(args) => commands::discover::run_discover(args),
        Commands::Version => {
            println!("dealmodel {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
