use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cursor;
use crate::store::types::{ActorSummary, CursorState, GlobalStats};
use crate::store::{CursorStore, FileStorage, SummaryStore};
use crate::telemetry::{self};
use crate::telemetry::ops::report::Phase as ReportPhase;
use crate::util::time::format_stamp;

pub const DEFAULT_TOP: usize = 5;
const RULE: &str = "==================================================";

#[derive(Args, Debug)]
pub struct ReportCmd {
    /// Number of users to list, ranked by issues created
    #[arg(long, default_value_t = DEFAULT_TOP)] pub top: usize,
}

pub async fn run(data_dir: &Path, args: ReportCmd) -> Result<()> {
    let store = FileStorage::open(data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    print_report(&store, args.top)
}

#[derive(Debug, Serialize)]
pub struct TopActor {
    pub username: String,
    pub issues_created: usize,
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    pub stats: Option<GlobalStats>,
    pub top_users: Vec<TopActor>,
    pub cursor: CursorState,
}

/// Highest `records_count` first. The sort is stable, so ties keep table
/// order (username ascending).
pub fn top_actors(rows: &[ActorSummary], n: usize) -> Vec<TopActor> {
    let mut ranked: Vec<&ActorSummary> = rows.iter().collect();
    ranked.sort_by(|a, b| b.records_count.cmp(&a.records_count));
    ranked
        .into_iter()
        .take(n)
        .map(|a| TopActor { username: a.actor.clone(), issues_created: a.records_count })
        .collect()
}

pub fn load_view<S>(store: &S, top: usize) -> Result<ReportView>
where
    S: SummaryStore + CursorStore + ?Sized,
{
    let log = telemetry::report();
    let _s = log.span(&ReportPhase::Load).entered();
    let stats = match store.load_stats() {
        Ok(s) => s,
        Err(e) if e.is_corrupt() => {
            log.warn_kv("stats file unreadable; treating as missing", [("error", e.to_string())]);
            None
        }
        Err(e) => return Err(e).context("loading statistics"),
    };
    let actors = store.load_actors().context("loading users table")?;
    let cursor = cursor::load(store).context("loading last run data")?;
    Ok(ReportView { stats, top_users: top_actors(&actors, top), cursor })
}

/// Read-only view of the current stats, top users and cursor.
pub fn print_report<S>(store: &S, top: usize) -> Result<()>
where
    S: SummaryStore + CursorStore + ?Sized,
{
    let log = telemetry::report();
    let _g = log.root_span_kv([("top", top.to_string())]).entered();
    let view = load_view(store, top)?;

    if telemetry::config::json_mode() {
        return log.result(&view);
    }
    let _s = log.span(&ReportPhase::Render).entered();
    let mut out = io::stdout().lock();
    render(&view, top, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn render(view: &ReportView, top: usize, w: &mut dyn Write) -> io::Result<()> {
    let Some(stats) = &view.stats else {
        return writeln!(w, "No statistics available.");
    };

    writeln!(w, "\n{RULE}")?;
    writeln!(w, "GITHUB PHISHING ATTACK REPORT")?;
    writeln!(w, "{RULE}")?;
    writeln!(w, "Last updated: {}", format_stamp(&stats.last_updated))?;
    writeln!(w, "Total phishing issues: {}", stats.total_records)?;
    writeln!(w, "Compromised users: {}", stats.distinct_actors)?;
    writeln!(w, "Affected repositories: {}", stats.distinct_resources)?;
    writeln!(w, "Total processed since start: {}", stats.total_processed_since_start)?;
    if let (Some(first), Some(latest)) = (&stats.first_record_date, &stats.latest_record_date) {
        writeln!(w, "First issue detected: {first}")?;
        writeln!(w, "Latest issue detected: {latest}")?;
    }
    writeln!(w, "{RULE}")?;

    if !view.top_users.is_empty() {
        writeln!(w, "\nTop {top} users with most issues:")?;
        for u in &view.top_users {
            writeln!(w, "  - {}: {} issues", u.username, u.issues_created)?;
        }
    }
    writeln!(w, "{RULE}\n")?;

    writeln!(w, "Incremental processing status:")?;
    match view.cursor.last_record_id {
        Some(id) => writeln!(w, "Last processed ID: {id}")?,
        None => writeln!(w, "Last processed ID: None")?,
    }
    match &view.cursor.last_run_time {
        Some(ts) => writeln!(w, "Last execution: {}", format_stamp(ts))?,
        None => writeln!(w, "Last execution: Never")?,
    }
    writeln!(w, "{RULE}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::{Stamp, parse_stamp};

    fn actor(name: &str, count: usize) -> ActorSummary {
        let ts = Stamp::At(parse_stamp("2024-03-01 00:00:00").unwrap());
        ActorSummary { actor: name.into(), first_detected: ts.clone(), resources_affected: 1, records_count: count, last_updated: ts }
    }

    fn stats(total: usize) -> GlobalStats {
        GlobalStats {
            last_updated: parse_stamp("2024-03-02 12:00:00").unwrap(),
            total_records: total,
            distinct_actors: 2,
            distinct_resources: 3,
            actors_list: vec!["bob".into(), "eve".into()],
            resources_list: vec![],
            total_processed_since_start: 40,
            first_record_date: Some("2024-03-01T00:00:00Z".into()),
            latest_record_date: Some("2024-03-02T00:00:00Z".into()),
            daily_counts: None,
        }
    }

    #[test]
    fn top_actors_ranks_by_count_with_stable_ties() {
        let rows = vec![actor("alice", 2), actor("bob", 7), actor("carol", 2), actor("dave", 1)];
        let top = top_actors(&rows, 3);
        let names: Vec<&str> = top.iter().map(|t| t.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn render_without_stats() {
        let view = ReportView { stats: None, top_users: vec![], cursor: CursorState::default() };
        let mut buf = Vec::new();
        render(&view, 5, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "No statistics available.\n");
    }

    #[test]
    fn render_full_report() {
        let view = ReportView {
            stats: Some(stats(12)),
            top_users: top_actors(&[actor("eve", 9), actor("bob", 3)], 5),
            cursor: CursorState { last_record_id: Some(4242), last_run_time: parse_stamp("2024-03-02 12:00:00"), total_records_processed: 40 },
        };
        let mut buf = Vec::new();
        render(&view, 5, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Total phishing issues: 12"));
        assert!(text.contains("First issue detected: 2024-03-01T00:00:00Z"));
        assert!(text.contains("  - eve: 9 issues\n  - bob: 3 issues"));
        assert!(text.contains("Last processed ID: 4242"));
        assert!(text.contains("Last execution: 2024-03-02 12:00:00"));
    }

    #[test]
    fn load_view_reads_persisted_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        store.save_stats(&stats(3)).unwrap();
        store.save_actors(&[actor("bob", 1), actor("eve", 2)]).unwrap();

        let view = load_view(&store, 1).unwrap();
        assert_eq!(view.stats.unwrap().total_records, 3);
        assert_eq!(view.top_users.len(), 1);
        assert_eq!(view.top_users[0].username, "eve");
        assert_eq!(view.cursor, CursorState::default());
    }
}
