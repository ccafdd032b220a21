use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use tracing::Instrument;

use crate::cursor;
use crate::output::types::Meta;
use crate::report;
use crate::search::{GitHubSearchClient, SEARCH_TERM, SearchClientConfig};
use crate::store::FileStorage;
use crate::telemetry::{self};
use crate::telemetry::ops::ingest::Phase as IngestPhase;

mod controller;
mod convert;
mod cutoff;
pub mod types;

use controller::run as run_once;
use types::{IngestResult, Mode, RunOptions};

#[derive(Args, Debug)]
pub struct IngestCmd {
    /// Ignore the saved cursor and rescan up to --pages pages
    #[arg(long, default_value_t = false)] pub full: bool,
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(1..))] pub pages: u32,
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=100))] pub per_page: u32,
    /// Courtesy pause between page requests
    #[arg(long, default_value_t = 1000)] pub delay_ms: u64,
    /// Skip the report printed after the run (always skipped with --json)
    #[arg(long, default_value_t = false)] pub no_report: bool,
}

pub async fn run(data_dir: &Path, args: IngestCmd) -> Result<()> {
    let log = telemetry::ingest();
    let mode = if args.full { Mode::Full } else { Mode::Incremental };
    let root = log.root_span_kv([
        ("mode", format!("{:?}", mode).to_lowercase()),
        ("pages", args.pages.to_string()),
        ("per_page", args.per_page.to_string()),
        ("data_dir", data_dir.display().to_string()),
    ]);
    run_in_span(data_dir, args, mode).instrument(root).await
}

async fn run_in_span(data_dir: &Path, args: IngestCmd, mode: Mode) -> Result<()> {
    let log = telemetry::ingest();
    let t0 = Instant::now();

    let mut store = FileStorage::open(data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    let prev = {
        let _s = log.span(&IngestPhase::LoadCursor).entered();
        cursor::load(&store).context("loading last run data")?
    };

    let client = GitHubSearchClient::new(SearchClientConfig::from_env()).context("building search client")?;
    if client.has_token() {
        log.info("🔑 GitHub token found in environment variables.");
    } else {
        log.warn("No GitHub token found in environment variables. Using standard rate limits.");
    }
    log.info(format!("Searching for issues with term: {SEARCH_TERM}"));

    let opts = RunOptions { mode, max_pages: args.pages, per_page: args.per_page, page_delay: Duration::from_millis(args.delay_ms) };
    let outcome = run_once(&client, &mut store, prev, &opts).await.context("ingestion run failed")?;
    log.info(format!("✅ Processing completed. {} new issues found.", outcome.new_records));

    let json = telemetry::config::json_mode();
    if json {
        let result = IngestResult {
            mode,
            new_records: outcome.new_records,
            duplicates: outcome.duplicates,
            pages_fetched: outcome.pages_fetched,
            stop: outcome.stop,
            cursor: &outcome.cursor,
            total_issues: outcome.stats.total_records,
        };
        telemetry::emit::print_result("ingest", &result, Some(Meta { duration_ms: Some(t0.elapsed().as_millis()) }))?;
    }

    if report_after_run(args.no_report, json) {
        report::print_report(&store, report::DEFAULT_TOP)?;
    }
    Ok(())
}

// JSON mode writes exactly one envelope per invocation.
fn report_after_run(no_report: bool, json: bool) -> bool {
    !no_report && !json
}
