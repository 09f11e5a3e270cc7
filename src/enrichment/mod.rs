//! Detail enrichment: fetch title/description for every discovered URL that
//! does not have them yet.
//!
//! The central invariant is incremental-crawl idempotence: a URL is fetched
//! at most once for its lifetime. Refs that already have details are only
//! marked re-seen, with no network access; only the remainder goes through
//! the admission gate (a counting semaphore bounding in-flight fetches).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::entities::{JobDetail, JobRef};
use crate::sites::{SelectorSet, selector_key};

const DETAIL_TIMEOUT: Duration = Duration::from_secs(60);
/// The optional expand control gets a short window; most pages don't have
/// one and must not stall the batch.
const EXPAND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// URLs enriched for the first time this run.
    pub scraped: usize,
    /// URLs that already had details and were only marked re-seen.
    pub reseen: usize,
    /// URLs skipped because their site has no selector configuration.
    pub skipped: usize,
    /// Fetches that yielded neither title nor description; these stay
    /// unenriched and will be retried on a future run.
    pub empty: usize,
    /// Fetch failures (timeout, HTTP error, ...); also future-run retries.
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    scraped: AtomicUsize,
    empty: AtomicUsize,
    failed: AtomicUsize,
}

/// Bring the detail map up to date for `refs`. Returns the full accumulated
/// map for the caller to persist in one atomic replace, alongside the batch
/// counters.
pub async fn enrich(
    browser: Arc<dyn Browser>,
    refs: &[JobRef],
    mut details: HashMap<String, JobDetail>,
    selectors: &HashMap<String, SelectorSet>,
    concurrency: usize,
) -> (HashMap<String, JobDetail>, EnrichOutcome) {
    let mut outcome = EnrichOutcome::default();

    // Re-seen pass: in place, no network.
    let now = Utc::now();
    let mut candidates: Vec<&JobRef> = Vec::new();
    for job_ref in refs {
        if let Some(detail) = details.get_mut(&job_ref.url) {
            detail.seen = true;
            detail.last_seen = Some(now);
            outcome.reseen += 1;
            debug!(url = %job_ref.url, "marked as seen");
        } else {
            candidates.push(job_ref);
        }
    }

    // Selector resolution; a site without one is a warning, not an error.
    let mut warned_sites: HashSet<&str> = HashSet::new();
    let mut work: Vec<(String, SelectorSet)> = Vec::new();
    for job_ref in candidates {
        match selectors.get(selector_key(&job_ref.site)) {
            Some(set) => work.push((job_ref.url.clone(), set.clone())),
            None => {
                outcome.skipped += 1;
                if warned_sites.insert(job_ref.site.as_str()) {
                    warn!(site = %job_ref.site, "no selector configuration, skipping its jobs");
                }
            }
        }
    }

    info!(
        pending = work.len(),
        reseen = outcome.reseen,
        skipped = outcome.skipped,
        concurrency,
        "enriching job details"
    );

    let shared = Arc::new(Mutex::new(details));
    let counters = Arc::new(Counters::default());
    let gate = Arc::new(Semaphore::new(concurrency));

    let mut handles = Vec::with_capacity(work.len());
    for (url, selector_set) in work {
        let browser = browser.clone();
        let shared = shared.clone();
        let counters = counters.clone();
        let gate = gate.clone();
        handles.push(tokio::spawn(async move {
            // The permit is held for the task's whole lifetime and released
            // on every exit path, success or failure.
            let Ok(_permit) = gate.acquire_owned().await else {
                return;
            };
            enrich_one(browser, &url, &selector_set, &shared, &counters).await;
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }

    outcome.scraped = counters.scraped.load(Ordering::SeqCst);
    outcome.empty = counters.empty.load(Ordering::SeqCst);
    outcome.failed = counters.failed.load(Ordering::SeqCst);
    info!(
        scraped = outcome.scraped,
        empty = outcome.empty,
        failed = outcome.failed,
        "enrichment finished"
    );

    let details = Arc::try_unwrap(shared)
        .map(|m| m.into_inner().expect("poisoned detail lock"))
        .unwrap_or_else(|shared| shared.lock().expect("poisoned detail lock").clone());
    (details, outcome)
}

async fn enrich_one(
    browser: Arc<dyn Browser>,
    url: &str,
    selector_set: &SelectorSet,
    shared: &Mutex<HashMap<String, JobDetail>>,
    counters: &Counters,
) {
    let page = match browser.open(url, DETAIL_TIMEOUT).await {
        Ok(page) => page,
        Err(err) => {
            warn!(url = %url, error = %err, "detail fetch failed");
            counters.failed.fetch_add(1, Ordering::SeqCst);
            return;
        }
    };

    if let Some(expand) = &selector_set.expand_selector
        && page.click_first(expand, EXPAND_TIMEOUT).await
    {
        debug!(url = %url, selector = %expand, "expanded description");
    }

    // Title and description are extracted independently; absence of either
    // degrades to an empty field.
    let title = page.text_first(&selector_set.title_selector).unwrap_or_default();
    let description = page
        .text_first(&selector_set.description_selector)
        .unwrap_or_default();

    if title.is_empty() && description.is_empty() {
        info!(url = %url, "nothing extracted, leaving unenriched for a future run");
        counters.empty.fetch_add(1, Ordering::SeqCst);
        return;
    }

    let detail = JobDetail {
        url: url.to_string(),
        title,
        description,
        scraped_at: Utc::now(),
        seen: false,
        last_seen: None,
    };
    info!(url = %url, title = %detail.title, "saved job details");
    shared
        .lock()
        .expect("poisoned detail lock")
        .insert(url.to_string(), detail);
    counters.scraped.fetch_add(1, Ordering::SeqCst);
}
