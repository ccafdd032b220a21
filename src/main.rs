use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

mod aggregate;
mod cursor;
mod ingest;
mod output;
mod report;
mod search;
mod store;
mod telemetry;
mod util;

#[derive(Parser)]
#[command(name = "phish-watch", about = "Track phishing issues on GitHub incrementally")]
struct Cli {
    /// Directory holding the issue/user tables and run state
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new matches, update the tables and print the report
    Ingest(ingest::IngestCmd),
    /// Print the current report without fetching
    Report(report::ReportCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and PHISH_LOG_FORMAT
    telemetry::config::init_tracing();
    let data_dir = cli
        .data_dir
        .or_else(|| env::var_os("PHISH_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"));

    match cli.command {
        Commands::Ingest(args) => ingest::run(&data_dir, args).await?,
        Commands::Report(args) => report::run(&data_dir, args).await?,
    }

    Ok(())
}
