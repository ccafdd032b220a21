use std::collections::HashSet;

use tracing::Instrument;

use crate::aggregate::{actors, stats};
use crate::cursor;
use crate::search::{SearchClient, SearchRequest};
use crate::store::types::CursorState;
use crate::store::{Storage, StoreError};
use crate::telemetry::{self};
use crate::telemetry::ops::ingest::Phase as IngestPhase;
use crate::util::time::now_stamp;

use super::convert::to_record;
use super::cutoff::apply_cutoff;
use super::types::{IngestOutcome, Mode, RunOptions, StopReason};

/// One ingestion pass: page through the search newest-first, append unseen
/// issues, then rebuild the user table and stats and finally persist the
/// advanced cursor. Writes happen in that order so an interrupted run only
/// has to redo the derived files next time.
///
/// A failed page fetch ends pagination but not the run. Storage errors abort
/// the run.
pub async fn run<C, S>(client: &C, store: &mut S, prev: CursorState, opts: &RunOptions) -> Result<IngestOutcome, StoreError>
where
    C: SearchClient + ?Sized,
    S: Storage + ?Sized,
{
    let log = telemetry::ingest();
    let run_ts = now_stamp();

    let cutoff = match opts.mode {
        Mode::Incremental => prev.last_record_id,
        Mode::Full => None,
    };
    if let Some(c) = cutoff {
        log.info(format!("🔎 Looking for issues newer than id {c}"));
    }

    let mut newest_id: Option<u64> = None;
    let mut new_actors: HashSet<String> = HashSet::new();
    let mut inserted = 0usize;
    let mut duplicates = 0usize;
    let mut pages_fetched = 0u32;
    let mut stop = StopReason::PageLimit;

    for page in 1..=opts.max_pages.max(1) {
        if page > 1 && !opts.page_delay.is_zero() {
            tokio::time::sleep(opts.page_delay).await;
        }

        let req = SearchRequest::page(page, opts.per_page);
        let fetched = client
            .search(&req)
            .instrument(log.span_kv(&IngestPhase::Fetch, [("page", page.to_string())]))
            .await;
        let items = match fetched {
            Ok(p) => p.items,
            Err(e) => {
                log.warn_kv("⚠️ search failed; ending pagination", [
                    ("page", page.to_string()),
                    ("rate_limited", e.is_rate_limited().to_string()),
                    ("error", e.to_string()),
                ]);
                stop = StopReason::SearchFailed;
                break;
            }
        };
        pages_fetched = page;

        if items.is_empty() {
            log.info("No more results found.");
            stop = StopReason::Exhausted;
            break;
        }

        // High-water mark comes from the raw first item, before any filtering.
        if page == 1 {
            newest_id = Some(items[0].id);
            log.info_kv("most recent issue", [("id", items[0].id.to_string())]);
        }

        let _p = log.span_kv(&IngestPhase::Page, [("page", page.to_string()), ("items", items.len().to_string())]).entered();
        let (accepted, halted) = apply_cutoff(&items, cutoff);

        let mut page_inserted = 0usize;
        let mut page_duplicates = 0usize;
        {
            let _w = log.span(&IngestPhase::Write).entered();
            for item in accepted {
                let record = to_record(item, run_ts);
                if store.append_if_absent(&record)? {
                    page_inserted += 1;
                    new_actors.insert(record.actor);
                } else {
                    page_duplicates += 1;
                }
            }
        }
        inserted += page_inserted;
        duplicates += page_duplicates;
        log.page_summary(page, items.len(), page_inserted, page_duplicates);

        if halted {
            let seen = items[accepted.len()].id;
            log.info_kv("⏹ reached already processed issue", [("id", seen.to_string())]);
            stop = StopReason::Cutoff;
            break;
        }
    }

    let processed_since_start = prev.total_records_processed.saturating_add(inserted as u64);

    {
        let _s = log.span_kv(&IngestPhase::Actors, [("new_actors", new_actors.len().to_string())]).entered();
        actors::recompute(store, run_ts, &new_actors)?;
    }
    let stats = {
        let _s = log.span(&IngestPhase::Stats).entered();
        stats::recompute(store, run_ts, processed_since_start)?
    };
    let next = cursor::advance(&prev, newest_id, inserted as u64, run_ts);
    {
        let _s = log.span(&IngestPhase::SaveCursor).entered();
        store.save_cursor(&next)?;
    }

    log.totals(inserted, duplicates, pages_fetched, stop.as_str());
    Ok(IngestOutcome { new_records: inserted, duplicates, pages_fetched, stop, cursor: next, stats })
}
