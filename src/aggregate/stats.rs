use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use crate::store::types::{GlobalStats, Record};
use crate::store::{RecordStore, StoreError, SummaryStore};
use crate::util::time::date_part;

/// Running totals for the stats document.
#[derive(Default)]
pub struct StatsTally {
    total: usize,
    actors: BTreeSet<String>,
    resources: BTreeSet<String>,
    first: Option<String>,
    latest: Option<String>,
    daily: BTreeMap<String, usize>,
}

impl StatsTally {
    pub fn push(&mut self, r: &Record) {
        self.total += 1;
        self.actors.insert(r.actor.clone());
        self.resources.insert(r.resource.clone());
        // ISO 8601 with zero padding orders correctly as text
        if self.first.as_deref().is_none_or(|f| r.created_at.as_str() < f) {
            self.first = Some(r.created_at.clone());
        }
        if self.latest.as_deref().is_none_or(|l| r.created_at.as_str() > l) {
            self.latest = Some(r.created_at.clone());
        }
        *self.daily.entry(date_part(&r.created_at).to_string()).or_insert(0) += 1;
    }

    pub fn finish(self, run_ts: NaiveDateTime, processed_since_start: u64) -> GlobalStats {
        let empty = self.total == 0;
        GlobalStats {
            last_updated: run_ts,
            total_records: self.total,
            distinct_actors: self.actors.len(),
            distinct_resources: self.resources.len(),
            actors_list: self.actors.into_iter().collect(),
            resources_list: self.resources.into_iter().collect(),
            total_processed_since_start: processed_since_start,
            first_record_date: self.first,
            latest_record_date: self.latest,
            daily_counts: if empty { None } else { Some(self.daily) },
        }
    }
}

/// Rebuilds and persists the stats document from the full record history.
pub fn recompute<S>(store: &mut S, run_ts: NaiveDateTime, processed_since_start: u64) -> Result<GlobalStats, StoreError>
where
    S: RecordStore + SummaryStore + ?Sized,
{
    let mut tally = StatsTally::default();
    for r in store.scan_all()? {
        tally.push(&r?);
    }
    let stats = tally.finish(run_ts, processed_since_start);
    store.save_stats(&stats)?;
    Ok(stats)
}
