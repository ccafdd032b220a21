use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::store::types::{ActorSummary, Record};
use crate::store::{RecordStore, StoreError, SummaryStore};
use crate::util::time::Stamp;

#[derive(Default)]
struct Tally {
    records: usize,
    resources: HashSet<String>,
}

/// Per-actor counts gathered from one pass over the record table.
#[derive(Default)]
pub struct ActorTally {
    by_actor: HashMap<String, Tally>,
}

impl ActorTally {
    pub fn push(&mut self, r: &Record) {
        let t = self.by_actor.entry(r.actor.clone()).or_default();
        t.records += 1;
        t.resources.insert(r.resource.clone());
    }

    /// Builds the replacement user table. Counts always come from the tally;
    /// `first_detected` is inherited from `prior` when present; `last_updated`
    /// moves to `run_ts` only for actors in `new_actors`.
    pub fn finish(self, prior: Vec<ActorSummary>, run_ts: NaiveDateTime, new_actors: &HashSet<String>) -> Vec<ActorSummary> {
        let mut prior: HashMap<String, ActorSummary> = prior.into_iter().map(|a| (a.actor.clone(), a)).collect();

        let mut keys: Vec<String> = prior.keys().cloned().collect();
        keys.extend(new_actors.iter().cloned());
        keys.extend(self.by_actor.keys().cloned());

        let mut rows: BTreeMap<String, ActorSummary> = BTreeMap::new();
        for actor in keys {
            if rows.contains_key(&actor) {
                continue;
            }
            let old = prior.remove(&actor);
            let (records_count, resources_affected) = self
                .by_actor
                .get(&actor)
                .map(|t| (t.records, t.resources.len()))
                .unwrap_or((0, 0));
            let first_detected = old.as_ref().map(|o| o.first_detected.clone()).unwrap_or(Stamp::At(run_ts));
            let last_updated = match old {
                Some(o) if !new_actors.contains(&actor) => o.last_updated,
                _ => Stamp::At(run_ts),
            };
            rows.insert(actor.clone(), ActorSummary { actor, first_detected, resources_affected, records_count, last_updated });
        }
        rows.into_values().collect()
    }
}

/// Rebuilds and persists the user table from the full record history.
pub fn recompute<S>(store: &mut S, run_ts: NaiveDateTime, new_actors: &HashSet<String>) -> Result<Vec<ActorSummary>, StoreError>
where
    S: RecordStore + SummaryStore + ?Sized,
{
    let prior = store.load_actors()?;
    let mut tally = ActorTally::default();
    for r in store.scan_all()? {
        tally.push(&r?);
    }
    let rows = tally.finish(prior, run_ts, new_actors);
    store.save_actors(&rows)?;
    Ok(rows)
}
