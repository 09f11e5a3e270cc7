use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::api::dtos::{
    AckResponse, ErrorResponse, HealthResponse, JobRow, JobsPage, JobsQuery, Pagination,
    ViewRequest,
};
use crate::api::{AppState, RunStatus};
use crate::entities::MatchStatus;
use crate::store::StoreError;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Response {
    match state.pipeline.store().stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => store_error(err),
    }
}

/// All discovered jobs joined with their details: unseen first, newest first
/// within each group, filtered and paginated.
pub async fn list_jobs(State(state): State<AppState>, Query(query): Query<JobsQuery>) -> Response {
    let store = state.pipeline.store();
    let (refs, details) = match (store.load_refs(), store.load_details()) {
        (Ok(refs), Ok(details)) => (refs, details),
        (Err(err), _) | (_, Err(err)) => return store_error(err),
    };

    let mut rows: Vec<JobRow> = refs
        .iter()
        .map(|job_ref| {
            let detail = details.get(&job_ref.url);
            JobRow {
                site: job_ref.site.clone(),
                url: job_ref.url.clone(),
                title: detail
                    .map(|d| d.title.clone())
                    .unwrap_or_else(|| "Not scraped yet".to_string()),
                description: detail.map(|d| d.description.clone()).unwrap_or_default(),
                seen: detail.map(|d| d.seen).unwrap_or(false),
                last_seen: detail.and_then(|d| d.last_seen),
                has_details: detail.is_some(),
            }
        })
        .collect();

    // Unseen jobs first; within each group the most recently discovered
    // come first (the store is append-ordered).
    rows.reverse();
    rows.sort_by_key(|row| row.seen);

    if let Some(search) = query.search.as_deref().map(str::to_lowercase)
        && !search.is_empty()
    {
        rows.retain(|row| {
            row.title.to_lowercase().contains(&search)
                || row.site.to_lowercase().contains(&search)
                || row.url.to_lowercase().contains(&search)
        });
    }
    if let Some(site) = query.site.as_deref().filter(|s| !s.is_empty()) {
        rows.retain(|row| row.site == site);
    }

    let per_page = query.per_page.max(1);
    let page = query.page.max(1);
    let total = rows.len();
    let total_pages = total.div_ceil(per_page);
    let jobs: Vec<JobRow> = rows
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Json(JobsPage {
        jobs,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    })
    .into_response()
}

pub async fn list_matches(State(state): State<AppState>) -> Response {
    match state.pipeline.store().load_matches() {
        Ok(matches) => Json(matches).into_response(),
        Err(err) => store_error(err),
    }
}

/// The only path that moves a match to `viewed`; the pipeline itself never
/// does.
pub async fn mark_viewed(
    State(state): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> Response {
    let store = state.pipeline.store();
    let mut matches = match store.load_matches() {
        Ok(matches) => matches,
        Err(err) => return store_error(err),
    };

    let Some(record) = matches.iter_mut().find(|m| m.url == request.url) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "job not found in match snapshot".to_string(),
            }),
        )
            .into_response();
    };
    record.status = MatchStatus::Viewed;
    record.is_new = false;

    match store.save_matches(&matches) {
        Ok(()) => {
            info!(url = %request.url, "match marked as viewed");
            Json(AckResponse { success: true }).into_response()
        }
        Err(err) => store_error(err),
    }
}

/// Kick off a full pipeline run in the background. Single-flight: a second
/// trigger while one is running is rejected.
pub async fn trigger_run(State(state): State<AppState>) -> Response {
    {
        let mut run = state.run.lock().expect("poisoned run status lock");
        if run.running {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: "a run is already in progress".to_string(),
                }),
            )
                .into_response();
        }
        *run = RunStatus {
            running: true,
            current_step: "starting".to_string(),
            message: String::new(),
        };
    }

    let pipeline = state.pipeline.clone();
    let run = state.run.clone();
    tokio::spawn(async move {
        let result = async {
            set_step(&run, "discovery");
            pipeline.run_discovery().await?;
            set_step(&run, "enrichment");
            pipeline.run_enrichment().await?;
            set_step(&run, "normalize");
            pipeline.run_normalize()?;
            set_step(&run, "matching");
            pipeline.run_matching().await?;
            anyhow::Ok(())
        }
        .await;

        let mut guard = run.lock().expect("poisoned run status lock");
        guard.running = false;
        match result {
            Ok(()) => {
                guard.current_step = "completed".to_string();
                guard.message = "full run completed".to_string();
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), step = %guard.current_step, "pipeline run failed");
                guard.message = format!("failed at {}: {err:#}", guard.current_step);
            }
        }
    });

    Json(AckResponse { success: true }).into_response()
}

pub async fn run_status(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.run.lock().expect("poisoned run status lock").clone())
}

fn set_step(run: &std::sync::Mutex<RunStatus>, step: &str) {
    run.lock().expect("poisoned run status lock").current_step = step.to_string();
}

fn store_error(err: StoreError) -> Response {
    error!(error = %err, "store access failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
