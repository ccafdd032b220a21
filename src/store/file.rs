use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use super::types::{ACTOR_HEADER, ActorSummary, CursorState, GlobalStats, RECORD_HEADER, Record};
use super::{CursorStore, RecordScan, RecordStore, StoreError, SummaryStore};

const ISSUES_FILE: &str = "phishing_issues.csv";
const USERS_FILE: &str = "compromised_users.csv";
const STATS_FILE: &str = "attack_stats.json";
const LAST_RUN_FILE: &str = "last_run_data.json";

/// Flat-file storage rooted at a data directory.
pub struct FileStorage {
    dir: PathBuf,
    ids: HashSet<u64>,
}

impl FileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let mut store = FileStorage { dir, ids: HashSet::new() };
        store.drop_torn_tail(ISSUES_FILE)?;
        store.init_table(ISSUES_FILE, &RECORD_HEADER)?;
        store.init_table(USERS_FILE, &ACTOR_HEADER)?;
        store.ids = store.load_ids()?;
        debug!(dir = %store.dir.display(), ids = store.ids.len(), "storage opened");
        Ok(store)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn init_table(&self, name: &str, header: &[&str]) -> Result<(), StoreError> {
        let path = self.path(name);
        let empty = match fs::metadata(&path) {
            Ok(m) => m.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(io_err(&path, e)),
        };
        if empty {
            let mut w = WriterBuilder::new().has_headers(false).from_path(&path).map_err(|e| csv_err(&path, e))?;
            w.write_record(header).map_err(|e| csv_err(&path, e))?;
            w.flush().map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }

    // A crash or full disk mid-append can leave a row without its newline.
    // Cut the table back to the last complete row so the next append starts
    // on a fresh line and the lost id is fetched again.
    fn drop_torn_tail(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path(name);
        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err(&path, e)),
        };
        let len = file.metadata().map_err(|e| io_err(&path, e))?.len();
        if len == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1)).map_err(|e| io_err(&path, e))?;
        file.read_exact(&mut last).map_err(|e| io_err(&path, e))?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let mut bytes = Vec::with_capacity(len as usize);
        file.seek(SeekFrom::Start(0)).map_err(|e| io_err(&path, e))?;
        file.read_to_end(&mut bytes).map_err(|e| io_err(&path, e))?;
        let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        file.set_len(keep as u64).map_err(|e| io_err(&path, e))?;
        file.sync_all().map_err(|e| io_err(&path, e))?;
        warn!(file = name, dropped_bytes = len - keep as u64, "truncated incomplete trailing row");
        Ok(())
    }

    // Only the first column is needed for dedup, so rows with broken later
    // fields still count as present.
    fn load_ids(&self) -> Result<HashSet<u64>, StoreError> {
        let path = self.path(ISSUES_FILE);
        let mut rdr = ReaderBuilder::new().flexible(true).from_path(&path).map_err(|e| csv_err(&path, e))?;
        let mut ids = HashSet::new();
        for row in rdr.records() {
            let row = match row {
                Ok(r) => r,
                Err(e) if e.is_io_error() => return Err(csv_err(&path, e)),
                Err(e) => { warn!(file = ISSUES_FILE, error = %e, "skipping unreadable row"); continue; }
            };
            match row.get(0).and_then(|v| v.trim().parse::<u64>().ok()) {
                Some(id) => { ids.insert(id); }
                None => warn!(file = ISSUES_FILE, row = ?row.position().map(|p| p.line()), "skipping row without numeric id"),
            }
        }
        Ok(ids)
    }

    fn read_optional(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Json { path: path.clone(), source: e })?;
        replace_file(&path, &bytes)
    }
}

impl RecordStore for FileStorage {
    fn append_if_absent(&mut self, record: &Record) -> Result<bool, StoreError> {
        if self.ids.contains(&record.id) {
            return Ok(false);
        }
        let path = self.path(ISSUES_FILE);
        let file = OpenOptions::new().append(true).create(true).open(&path).map_err(|e| io_err(&path, e))?;
        let mut w = WriterBuilder::new().has_headers(false).from_writer(file);
        w.serialize(record).map_err(|e| csv_err(&path, e))?;
        w.flush().map_err(|e| io_err(&path, e))?;
        self.ids.insert(record.id);
        Ok(true)
    }

    fn scan_all(&self) -> Result<RecordScan<'_>, StoreError> {
        let path = self.path(ISSUES_FILE);
        let rdr = match ReaderBuilder::new().flexible(true).from_path(&path) {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(csv_err(&path, e)),
        };
        let rows = rdr.into_deserialize::<Record>().filter_map(move |row| match row {
            Ok(r) => Some(Ok(r)),
            Err(e) if e.is_io_error() => Some(Err(csv_err(&path, e))),
            Err(e) => { warn!(file = ISSUES_FILE, error = %e, "skipping malformed record"); None }
        });
        Ok(Box::new(rows))
    }
}

impl SummaryStore for FileStorage {
    fn load_actors(&self) -> Result<Vec<ActorSummary>, StoreError> {
        let path = self.path(USERS_FILE);
        let mut rdr = match ReaderBuilder::new().flexible(true).from_path(&path) {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(csv_err(&path, e)),
        };
        let mut out = Vec::new();
        for row in rdr.deserialize::<ActorSummary>() {
            match row {
                Ok(r) => out.push(r),
                Err(e) if e.is_io_error() => return Err(csv_err(&path, e)),
                Err(e) => warn!(file = USERS_FILE, error = %e, "skipping malformed user row"),
            }
        }
        Ok(out)
    }

    fn save_actors(&mut self, rows: &[ActorSummary]) -> Result<(), StoreError> {
        let path = self.path(USERS_FILE);
        let mut w = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        w.write_record(ACTOR_HEADER).map_err(|e| csv_err(&path, e))?;
        for row in rows {
            w.serialize(row).map_err(|e| csv_err(&path, e))?;
        }
        let bytes = w.into_inner().map_err(|e| io_err(&path, e.into_error()))?;
        replace_file(&path, &bytes)
    }

    fn load_stats(&self) -> Result<Option<GlobalStats>, StoreError> {
        let Some(raw) = self.read_optional(STATS_FILE)? else { return Ok(None) };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { path: self.path(STATS_FILE), reason: e.to_string() })
    }

    fn save_stats(&mut self, stats: &GlobalStats) -> Result<(), StoreError> {
        self.write_json(STATS_FILE, stats)
    }
}

impl CursorStore for FileStorage {
    fn load_cursor(&self) -> Result<Option<CursorState>, StoreError> {
        let Some(raw) = self.read_optional(LAST_RUN_FILE)? else { return Ok(None) };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { path: self.path(LAST_RUN_FILE), reason: e.to_string() })
    }

    fn save_cursor(&mut self, cursor: &CursorState) -> Result<(), StoreError> {
        self.write_json(LAST_RUN_FILE, cursor)
    }
}

// Write a sibling temp file, then rename over the target.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let mut f = fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    f.write_all(bytes).map_err(|e| io_err(&tmp, e))?;
    f.sync_all().map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

fn is_not_found(e: &csv::Error) -> bool {
    matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound)
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io { path: path.to_path_buf(), source }
}

fn csv_err(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv { path: path.to_path_buf(), source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::{Stamp, parse_stamp};

    fn record(id: u64, actor: &str, repo: &str, title: &str) -> Record {
        Record {
            id,
            resource: repo.into(),
            title: title.into(),
            actor: actor.into(),
            created_at: "2024-03-01T10:00:00Z".into(),
            url: format!("https://github.com/{repo}/issues/{id}"),
            ingested_at: parse_stamp("2024-03-02 08:00:00").unwrap(),
        }
    }

    #[test]
    fn open_writes_table_headers() {
        let dir = tempfile::tempdir().unwrap();
        FileStorage::open(dir.path()).unwrap();
        let issues = fs::read_to_string(dir.path().join(ISSUES_FILE)).unwrap();
        let users = fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        assert_eq!(issues.trim_end(), "issue_id,repo,title,creator,created_at,url,processed_at");
        assert_eq!(users.trim_end(), "username,first_detected,repos_affected,issues_created,last_updated");
    }

    #[test]
    fn append_is_idempotent_and_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(store.append_if_absent(&record(10, "mallory", "a/b", "first")).unwrap());
        assert!(!store.append_if_absent(&record(10, "mallory", "a/b", "second")).unwrap());

        let rows: Vec<Record> = store.scan_all().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "first");
    }

    #[test]
    fn reopened_store_remembers_ids() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStorage::open(dir.path()).unwrap();
            store.append_if_absent(&record(1, "eve", "x/y", "t")).unwrap();
        }
        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(!store.append_if_absent(&record(1, "eve", "x/y", "t")).unwrap());
        assert!(store.append_if_absent(&record(2, "eve", "x/y", "t")).unwrap());
    }

    #[test]
    fn scan_preserves_append_order_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        for id in [30, 10, 20] {
            store.append_if_absent(&record(id, "eve", "x/y", "title, with comma")).unwrap();
        }
        let first: Vec<u64> = store.scan_all().unwrap().map(|r| r.unwrap().id).collect();
        let second: Vec<u64> = store.scan_all().unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(first, vec![30, 10, 20]);
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ISSUES_FILE);
        fs::write(
            &path,
            "issue_id,repo,title,creator,created_at,url,processed_at\n\
             5,a/b,ok,eve,2024-01-01T00:00:00Z,https://x,2024-01-02 00:00:00\n\
             short,row\n",
        )
        .unwrap();
        let store = FileStorage::open(dir.path()).unwrap();
        let rows: Vec<Record> = store.scan_all().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 5);
    }

    #[test]
    fn cursor_missing_then_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(store.load_cursor().unwrap().is_none());

        fs::write(dir.path().join(LAST_RUN_FILE), "{not json").unwrap();
        assert!(store.load_cursor().unwrap_err().is_corrupt());

        let c = CursorState { last_record_id: Some(9), last_run_time: None, total_records_processed: 3 };
        store.save_cursor(&c).unwrap();
        assert_eq!(store.load_cursor().unwrap(), Some(c));
    }

    #[test]
    fn actors_round_trip_through_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(store.load_actors().unwrap().is_empty());

        let ts = Stamp::At(parse_stamp("2024-03-02 08:00:00").unwrap());
        let rows = vec![ActorSummary { actor: "eve".into(), first_detected: ts.clone(), resources_affected: 2, records_count: 3, last_updated: ts }];
        store.save_actors(&rows).unwrap();
        assert_eq!(store.load_actors().unwrap(), rows);
        assert!(!dir.path().join("compromised_users.tmp").exists());
    }

    #[test]
    fn torn_trailing_row_is_dropped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStorage::open(dir.path()).unwrap();
            store.append_if_absent(&record(1, "eve", "a/b", "t")).unwrap();
        }
        let path = dir.path().join(ISSUES_FILE);
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"2,a/b,tor").unwrap();
        drop(f);

        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
        assert!(store.append_if_absent(&record(3, "eve", "a/b", "t")).unwrap());
        // the torn row's id is not indexed, so it can be written again
        assert!(store.append_if_absent(&record(2, "eve", "a/b", "t")).unwrap());
        assert_eq!(stored(&store), vec![1, 3, 2]);

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(stored(&reopened), vec![1, 3, 2]);
        assert!(reopened.ids.contains(&3));
    }

    #[test]
    fn torn_header_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(ISSUES_FILE), "issue_id,re").unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        assert!(store.append_if_absent(&record(7, "eve", "a/b", "t")).unwrap());
        assert_eq!(stored(&store), vec![7]);
    }

    #[test]
    fn user_row_with_hand_edited_stamp_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(USERS_FILE),
            "username,first_detected,repos_affected,issues_created,last_updated\n\
             eve,last spring,1,2,2024-03-02 08:00:00\n",
        )
        .unwrap();
        let mut store = FileStorage::open(dir.path()).unwrap();
        let rows = store.load_actors().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_detected, Stamp::Raw("last spring".into()));

        store.save_actors(&rows).unwrap();
        let text = fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        assert!(text.contains("eve,last spring,1,2,2024-03-02 08:00:00"));
    }

    fn stored(store: &FileStorage) -> Vec<u64> {
        store.scan_all().unwrap().map(|r| r.unwrap().id).collect()
    }
}
