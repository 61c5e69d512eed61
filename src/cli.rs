use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fmi-diagnostic")]
#[command(
    version,
    about = "Fishing-to-natural mortality index (F/M) diagnostics validated against stock collapses"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Source SQLite dataset (tried before the configured candidates)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory for CSV and JSON output
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// CSV of known collapses (stock_pattern,collapse_year,label)
    #[arg(long, global = true)]
    pub collapse_table: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More diagnostic logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, index, validate and render; writes every table and chart
    Run {
        /// Only render these charts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these charts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,
    },

    /// Write the stock-year F/M table only
    Extract,

    /// Write the index and validation tables, no charts
    Validate,

    /// Render charts only
    Render {
        /// Only render these charts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these charts (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,
    },

    /// Classify a single F and M pair
    Classify {
        /// Fishing mortality (1/yr)
        f: f64,

        /// Natural mortality (1/yr)
        m: f64,
    },

    /// List all available chart names
    ListCharts,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
