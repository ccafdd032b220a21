use chrono::NaiveDateTime;
use url::Url;

use crate::search::SearchItem;
use crate::store::types::Record;

// ".../repos/acme/widgets" -> "acme/widgets"; anything unexpected is kept verbatim.
fn repo_slug(repository_url: &str) -> String {
    Url::parse(repository_url)
        .ok()
        .and_then(|u| u.path().split_once("/repos/").map(|(_, p)| p.trim_end_matches('/').to_string()))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| repository_url.to_string())
}

pub fn to_record(item: &SearchItem, ingested_at: NaiveDateTime) -> Record {
    Record {
        id: item.id,
        resource: repo_slug(&item.repository_url),
        title: item.title.clone(),
        actor: item.user.login.clone(),
        created_at: item.created_at.clone(),
        url: item.html_url.clone(),
        ingested_at,
    }
}
