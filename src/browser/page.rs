use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::browser::client::fetch_html;
use crate::browser::errors::FetchError;
use crate::browser::{Browser, Page};

/// A fetched, fully materialized HTML document addressed by CSS selectors.
///
/// The raw markup is kept as a string and re-parsed per query: `scraper`'s
/// parsed DOM is not `Send`, and page handles cross task boundaries. The
/// handful of selector reads per page makes the re-parse cost irrelevant
/// next to the network fetch.
pub struct HtmlPage {
    url: Url,
    html: String,
    pub fetched_at: DateTime<Utc>,
}

impl HtmlPage {
    pub fn new(url: Url, html: String) -> Self {
        Self {
            url,
            html,
            fetched_at: Utc::now(),
        }
    }

    fn with_selector<T>(&self, selector: &str, f: impl FnOnce(&Html, &Selector) -> T) -> Option<T> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("unparseable selector {selector:?}: {err:?}");
                return None;
            }
        };
        let document = Html::parse_document(&self.html);
        Some(f(&document, &parsed))
    }
}

#[async_trait]
impl Page for HtmlPage {
    /// Final URL after redirects; relative links resolve against this, not
    /// the configured entry URL.
    fn url(&self) -> &Url {
        &self.url
    }

    /// A static document either has the element or never will, so the wait
    /// resolves immediately regardless of the timeout.
    async fn wait_for(&self, selector: &str, _timeout: Duration) -> bool {
        self.count(selector) > 0
    }

    fn count(&self, selector: &str) -> usize {
        self.with_selector(selector, |doc, sel| doc.select(sel).count())
            .unwrap_or(0)
    }

    fn text_first(&self, selector: &str) -> Option<String> {
        self.with_selector(selector, |doc, sel| {
            doc.select(sel).next().map(|el| {
                el.text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        })
        .flatten()
        .filter(|t| !t.is_empty())
    }

    fn attr_all(&self, selector: &str, attr: &str) -> Vec<String> {
        self.with_selector(selector, |doc, sel| {
            doc.select(sel)
                .filter_map(|el| el.value().attr(attr))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Interactions need a live browser; against a static document the
    /// control is reported as absent, which callers treat as a no-op.
    async fn click_first(&self, _selector: &str, _timeout: Duration) -> bool {
        false
    }
}

/// Plain-HTTP `Browser` over the shared reqwest client.
#[derive(Debug, Default, Clone)]
pub struct HttpBrowser;

impl HttpBrowser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Page>, FetchError> {
        let (final_url, html) = fetch_html(url, timeout).await?;
        Ok(Box::new(HtmlPage::new(final_url, html)))
    }
}
