use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::util::time::{Stamp, stamp, stamp_opt};

/// One ingested search match, as stored in `phishing_issues.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "issue_id")]
    pub id: u64,
    #[serde(rename = "repo")]
    pub resource: String,
    pub title: String,
    #[serde(rename = "creator")]
    pub actor: String,
    pub created_at: String,
    pub url: String,
    #[serde(rename = "processed_at", with = "stamp")]
    pub ingested_at: NaiveDateTime,
}

pub const RECORD_HEADER: [&str; 7] = ["issue_id", "repo", "title", "creator", "created_at", "url", "processed_at"];

/// Per-actor row of `compromised_users.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSummary {
    #[serde(rename = "username")]
    pub actor: String,
    pub first_detected: Stamp,
    #[serde(rename = "repos_affected")]
    pub resources_affected: usize,
    #[serde(rename = "issues_created")]
    pub records_count: usize,
    pub last_updated: Stamp,
}

pub const ACTOR_HEADER: [&str; 5] = ["username", "first_detected", "repos_affected", "issues_created", "last_updated"];

/// Snapshot written to `attack_stats.json`, rebuilt from scratch each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    #[serde(with = "stamp")]
    pub last_updated: NaiveDateTime,
    #[serde(rename = "total_issues")]
    pub total_records: usize,
    #[serde(rename = "compromised_users")]
    pub distinct_actors: usize,
    #[serde(rename = "affected_repos")]
    pub distinct_resources: usize,
    #[serde(rename = "users_list")]
    pub actors_list: Vec<String>,
    #[serde(rename = "repos_list")]
    pub resources_list: Vec<String>,
    pub total_processed_since_start: u64,
    // Absent (not null) when the store is empty.
    #[serde(rename = "first_issue_date", default, skip_serializing_if = "Option::is_none")]
    pub first_record_date: Option<String>,
    #[serde(rename = "latest_issue_date", default, skip_serializing_if = "Option::is_none")]
    pub latest_record_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_counts: Option<BTreeMap<String, usize>>,
}

/// Ingestion progress carried between runs in `last_run_data.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(rename = "last_issue_id")]
    pub last_record_id: Option<u64>,
    #[serde(default, with = "stamp_opt")]
    pub last_run_time: Option<NaiveDateTime>,
    #[serde(rename = "total_issues_processed", default)]
    pub total_records_processed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::parse_stamp;

    #[test]
    fn cursor_json_uses_persisted_key_names() {
        let c = CursorState {
            last_record_id: Some(42),
            last_run_time: parse_stamp("2024-01-02 03:04:05"),
            total_records_processed: 7,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["last_issue_id"], 42);
        assert_eq!(v["last_run_time"], "2024-01-02 03:04:05");
        assert_eq!(v["total_issues_processed"], 7);
    }

    #[test]
    fn fresh_cursor_file_parses_as_no_prior_run() {
        let raw = r#"{"last_issue_id": null, "last_run_time": null, "total_issues_processed": 0}"#;
        let c: CursorState = serde_json::from_str(raw).unwrap();
        assert_eq!(c, CursorState::default());
    }

    #[test]
    fn empty_stats_omit_date_fields() {
        let stats = GlobalStats {
            last_updated: parse_stamp("2024-01-02 03:04:05").unwrap(),
            total_records: 0,
            distinct_actors: 0,
            distinct_resources: 0,
            actors_list: vec![],
            resources_list: vec![],
            total_processed_since_start: 0,
            first_record_date: None,
            latest_record_date: None,
            daily_counts: None,
        };
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["total_issues"], 0);
        assert!(v.get("first_issue_date").is_none());
        assert!(v.get("latest_issue_date").is_none());
        assert!(v.get("daily_counts").is_none());
    }
}
