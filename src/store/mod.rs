//! Persistence behind three small traits: the append-only issue table, the
//! derived summaries (users + stats), and the run cursor. `FileStorage` keeps
//! them as flat files in one data directory.

use std::path::PathBuf;

use thiserror::Error;

mod file;
pub mod types;

pub use file::FileStorage;
use types::{ActorSummary, CursorState, GlobalStats, Record};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("csv error on {path}: {source}")]
    Csv { path: PathBuf, #[source] source: csv::Error },
    #[error("json error on {path}: {source}")]
    Json { path: PathBuf, #[source] source: serde_json::Error },
    #[error("corrupt state in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

/// Lazy pass over stored records, oldest-appended first.
pub type RecordScan<'a> = Box<dyn Iterator<Item = Result<Record, StoreError>> + 'a>;

pub trait RecordStore {
    /// Writes `record` unless its id is already stored. First write wins;
    /// an existing row is never touched.
    fn append_if_absent(&mut self, record: &Record) -> Result<bool, StoreError>;

    /// Each call starts a fresh pass from the first stored row.
    fn scan_all(&self) -> Result<RecordScan<'_>, StoreError>;
}

pub trait SummaryStore {
    fn load_actors(&self) -> Result<Vec<ActorSummary>, StoreError>;
    fn save_actors(&mut self, rows: &[ActorSummary]) -> Result<(), StoreError>;
    fn load_stats(&self) -> Result<Option<GlobalStats>, StoreError>;
    fn save_stats(&mut self, stats: &GlobalStats) -> Result<(), StoreError>;
}

pub trait CursorStore {
    /// `Ok(None)` when no cursor was ever written; `Corrupt` when it cannot be parsed.
    fn load_cursor(&self) -> Result<Option<CursorState>, StoreError>;
    fn save_cursor(&mut self, cursor: &CursorState) -> Result<(), StoreError>;
}

pub trait Storage: RecordStore + SummaryStore + CursorStore {}

impl<T: RecordStore + SummaryStore + CursorStore> Storage for T {}
