use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::store::types::CursorState;
use crate::store::{CursorStore, StoreError};

/// Reads the saved cursor. A missing or unparsable file falls back to the
/// "no prior run" state so the next run scans in full; only I/O failures
/// are returned.
pub fn load<S: CursorStore + ?Sized>(store: &S) -> Result<CursorState, StoreError> {
    match store.load_cursor() {
        Ok(Some(c)) => Ok(c),
        Ok(None) => {
            info!("no previous run recorded; starting from scratch");
            Ok(CursorState::default())
        }
        Err(e) if e.is_corrupt() => {
            warn!(error = %e, "last run file is corrupted; starting from scratch");
            Ok(CursorState::default())
        }
        Err(e) => Err(e),
    }
}

/// Cursor after a run: the id never moves backwards, the run time always
/// moves to `now`, and the processed counter only grows.
pub fn advance(prev: &CursorState, newest_id: Option<u64>, new_records: u64, now: NaiveDateTime) -> CursorState {
    let last_record_id = match (prev.last_record_id, newest_id) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    CursorState {
        last_record_id,
        last_run_time: Some(now),
        total_records_processed: prev.total_records_processed.saturating_add(new_records),
    }
}
