use std::time::Duration;

use serde::Serialize;

use crate::store::types::{CursorState, GlobalStats};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Stop at the first issue at or below the saved cursor.
    Incremental,
    /// Ignore the cursor and walk up to `max_pages`.
    Full,
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub mode: Mode,
    pub max_pages: u32,
    pub per_page: u32,
    /// Pause before every page after the first.
    pub page_delay: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    Cutoff,
    PageLimit,
    SearchFailed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::Cutoff => "cutoff",
            StopReason::PageLimit => "page_limit",
            StopReason::SearchFailed => "search_failed",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IngestOutcome {
    pub new_records: usize,
    pub duplicates: usize,
    pub pages_fetched: u32,
    pub stop: StopReason,
    pub cursor: CursorState,
    pub stats: GlobalStats,
}

// Result envelope payload
#[derive(Serialize)]
pub struct IngestResult<'a> {
    pub mode: Mode,
    pub new_records: usize,
    pub duplicates: usize,
    pub pages_fetched: u32,
    pub stop: StopReason,
    pub cursor: &'a CursorState,
    pub total_issues: usize,
}
