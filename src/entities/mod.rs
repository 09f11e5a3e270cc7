use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a match snapshot entry. `Viewed` is only ever set by an
/// explicit user action through the dashboard, never by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Viewed,
}

/// A job posting URL discovered on a listing page. Identity is the `url`,
/// globally across all sites: the same posting surfaced by two site configs
/// is one JobRef. Append-only once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRef {
    pub site: String,
    pub url: String,
    pub found_at: DateTime<Utc>,
}

/// Extracted title/description for a discovered URL, keyed by `url` in the
/// detail store. Created once per URL; later runs only flip `seen` and bump
/// `last_seen` (re-seen, never re-scraped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    pub url: String,
    pub title: String,
    pub description: String,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Normalized, truncated text representation of a job, ready for the
/// embedding model. Derived from JobDetail; regenerable at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddableJob {
    pub url: String,
    pub title: String,
    pub cleaned_text: String,
}

/// One entry of the match snapshot. `score`/`description` are recomputed each
/// run; `matched_at` and `status` carry forward from the previous snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub url: String,
    pub title: String,
    pub score: f32,
    pub description: String,
    pub matched_at: DateTime<Utc>,
    pub is_new: bool,
    pub status: MatchStatus,
}

/// Counts exposed on the observability query surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub urls_known: usize,
    pub details_known: usize,
    pub seen_count: usize,
    pub per_site: HashMap<String, usize>,
}
