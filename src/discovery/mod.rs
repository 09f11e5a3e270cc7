//! URL discovery: turn the configured listing pages into new JobRefs.
//!
//! Every site runs as its own task behind its own failure boundary; one
//! site's timeout or selector drift never costs the others their results.
//! Dedup is global across sites (two boards can list the same posting), so
//! the seen-set and the new-ref list live behind a single lock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::entities::JobRef;
use crate::sites::SiteConfig;

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(180);
const LIST_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Newly found refs only; the caller merges them into the URL store.
    pub new_refs: Vec<JobRef>,
    pub sites_ok: usize,
    pub sites_failed: usize,
}

struct Discovered {
    seen: HashSet<String>,
    new_refs: Vec<JobRef>,
}

/// Visit every configured site concurrently and collect job URLs not in
/// `known`. Per-site failures are logged and counted, never propagated, and
/// whatever was discovered before a failure is still returned.
pub async fn discover(
    browser: Arc<dyn Browser>,
    sites: &[SiteConfig],
    known: &HashSet<String>,
) -> DiscoveryOutcome {
    let shared = Arc::new(Mutex::new(Discovered {
        seen: known.clone(),
        new_refs: Vec::new(),
    }));

    let mut handles = Vec::with_capacity(sites.len());
    for site in sites.iter().cloned() {
        let browser = browser.clone();
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            discover_site(browser, &site, &shared).await
        }));
    }

    let mut outcome = DiscoveryOutcome::default();
    for (site, handle) in sites.iter().zip(handles) {
        match handle.await {
            Ok(Ok(found)) => {
                outcome.sites_ok += 1;
                info!(site = %site.name, found, "site discovery complete");
            }
            Ok(Err(err)) => {
                outcome.sites_failed += 1;
                warn!(site = %site.name, error = %err, "site discovery failed");
            }
            Err(err) => {
                outcome.sites_failed += 1;
                warn!(site = %site.name, error = %err, "site discovery task aborted");
            }
        }
    }

    let shared = Arc::try_unwrap(shared)
        .map(|m| m.into_inner().expect("poisoned discovery lock"))
        .unwrap_or_else(|shared| {
            // All tasks were joined above, so this arm is unreachable in
            // practice; cloning out keeps it total anyway.
            let guard = shared.lock().expect("poisoned discovery lock");
            Discovered {
                seen: guard.seen.clone(),
                new_refs: guard.new_refs.clone(),
            }
        });
    outcome.new_refs = shared.new_refs;

    info!(
        new = outcome.new_refs.len(),
        sites_ok = outcome.sites_ok,
        sites_failed = outcome.sites_failed,
        "discovery finished"
    );
    outcome
}

/// Crawl one listing page. Returns the number of new refs it contributed.
async fn discover_site(
    browser: Arc<dyn Browser>,
    site: &SiteConfig,
    shared: &Mutex<Discovered>,
) -> Result<usize> {
    info!(site = %site.name, url = %site.entry_url, "scraping listing page");
    let page = browser
        .open(&site.entry_url, PAGE_LOAD_TIMEOUT)
        .await
        .with_context(|| format!("opening {}", site.entry_url))?;

    // Wait for items inside the container, not just the container: some
    // boards render the shell first and fill it in later.
    let item_selector = format!("{} {}", site.list_container_selector, site.list_item_selector);
    if !page.wait_for(&item_selector, LIST_WAIT_TIMEOUT).await {
        bail!("no list items appeared for selector {item_selector:?}");
    }
    debug!(site = %site.name, items = page.count(&item_selector), "listing items present");

    let link_selector = format!("{} {}", item_selector, site.item_link_selector);
    let mut found = 0;
    for href in page.attr_all(&link_selector, "href") {
        if href.is_empty() {
            continue;
        }
        // Resolve against the page's current URL, not the configured entry
        // URL: the listing may have redirected.
        let url = match page.url().join(&href) {
            Ok(url) => url.to_string(),
            Err(err) => {
                debug!(site = %site.name, href = %href, error = %err, "unresolvable link");
                continue;
            }
        };

        let mut guard = shared.lock().expect("poisoned discovery lock");
        if guard.seen.insert(url.clone()) {
            guard.new_refs.push(JobRef {
                site: site.name.clone(),
                url: url.clone(),
                found_at: Utc::now(),
            });
            found += 1;
            debug!(site = %site.name, url = %url, "new job url");
        } else {
            debug!(site = %site.name, url = %url, "duplicate, skipping");
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeBrowser;

    fn site(name: &str, entry_url: &str) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            entry_url: entry_url.to_string(),
            list_container_selector: "ul.jobs".to_string(),
            list_item_selector: "li.job".to_string(),
            item_link_selector: "a".to_string(),
        }
    }

    fn listing(links: &[&str]) -> String {
        let items: String = links
            .iter()
            .map(|href| format!("<li class=\"job\"><a href=\"{href}\">job</a></li>"))
            .collect();
        format!("<ul class=\"jobs\">{items}</ul>")
    }

    #[tokio::test]
    async fn same_url_from_two_sites_yields_one_ref() {
        let mut browser = FakeBrowser::new();
        browser.insert(
            "https://boards.example/a",
            &listing(&["https://jobs.example/rust-1", "https://jobs.example/rust-2"]),
        );
        browser.insert(
            "https://boards.example/b",
            &listing(&["https://jobs.example/rust-1", "https://jobs.example/rust-3"]),
        );

        let sites = vec![
            site("board-a", "https://boards.example/a"),
            site("board-b", "https://boards.example/b"),
        ];
        let outcome = discover(Arc::new(browser), &sites, &HashSet::new()).await;

        assert_eq!(outcome.sites_ok, 2);
        assert_eq!(outcome.sites_failed, 0);
        assert_eq!(outcome.new_refs.len(), 3);
        let shared: Vec<&JobRef> = outcome
            .new_refs
            .iter()
            .filter(|r| r.url == "https://jobs.example/rust-1")
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[tokio::test]
    async fn known_urls_are_skipped() {
        let mut browser = FakeBrowser::new();
        browser.insert(
            "https://boards.example/a",
            &listing(&["https://jobs.example/old", "https://jobs.example/new"]),
        );

        let known: HashSet<String> = ["https://jobs.example/old".to_string()].into();
        let outcome =
            discover(Arc::new(browser), &[site("a", "https://boards.example/a")], &known).await;

        assert_eq!(outcome.new_refs.len(), 1);
        assert_eq!(outcome.new_refs[0].url, "https://jobs.example/new");
    }

    #[tokio::test]
    async fn one_failing_site_does_not_abort_the_others() {
        let mut browser = FakeBrowser::new();
        browser.insert(
            "https://boards.example/up",
            &listing(&["https://jobs.example/1"]),
        );
        // "https://boards.example/down" is not served: open fails.

        let sites = vec![
            site("down", "https://boards.example/down"),
            site("up", "https://boards.example/up"),
        ];
        let outcome = discover(Arc::new(browser), &sites, &HashSet::new()).await;

        assert_eq!(outcome.sites_ok, 1);
        assert_eq!(outcome.sites_failed, 1);
        assert_eq!(outcome.new_refs.len(), 1);
    }

    #[tokio::test]
    async fn zero_items_is_a_reported_per_site_failure() {
        let mut browser = FakeBrowser::new();
        browser.insert("https://boards.example/empty", "<ul class=\"jobs\"></ul>");

        let outcome = discover(
            Arc::new(browser),
            &[site("empty", "https://boards.example/empty")],
            &HashSet::new(),
        )
        .await;

        assert_eq!(outcome.sites_ok, 0);
        assert_eq!(outcome.sites_failed, 1);
        assert!(outcome.new_refs.is_empty());
    }

    #[tokio::test]
    async fn relative_links_resolve_against_page_url() {
        let mut browser = FakeBrowser::new();
        browser.insert(
            "https://boards.example/list?page=1",
            &listing(&["/jobs/42", "jobs/43"]),
        );

        let outcome = discover(
            Arc::new(browser),
            &[site("rel", "https://boards.example/list?page=1")],
            &HashSet::new(),
        )
        .await;

        let urls: Vec<&str> = outcome.new_refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://boards.example/jobs/42", "https://boards.example/jobs/43"]
        );
    }
}
