use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub success: bool,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

/// A discovered URL joined with whatever details exist for it.
#[derive(Serialize)]
pub struct JobRow {
    pub site: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub seen: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub has_details: bool,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Serialize)]
pub struct JobsPage {
    pub jobs: Vec<JobRow>,
    pub pagination: Pagination,
}

#[derive(Deserialize)]
pub struct ViewRequest {
    pub url: String,
}
