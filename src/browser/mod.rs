//! Page fetch-and-extract capability.
//!
//! The engines only ever talk to the `Browser`/`Page` traits, so the fetch
//! mechanics stay swappable: the default `HttpBrowser` does a plain HTTP GET
//! and addresses the static DOM with CSS selectors, while tests inject fake
//! implementations. Element absence is a normal value (`None`, `0`, `false`),
//! never an error.

pub mod client;
pub mod errors;
pub mod page;

pub use errors::FetchError;
pub use page::{HtmlPage, HttpBrowser};

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// A loaded page, queryable by CSS selector.
#[async_trait]
pub trait Page: Send + Sync {
    /// The page's URL after any redirects.
    fn url(&self) -> &Url;

    /// Wait until the selector matches at least once, up to `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    /// Number of elements matching the selector.
    fn count(&self, selector: &str) -> usize;

    /// Text content of the first match, if any.
    fn text_first(&self, selector: &str) -> Option<String>;

    /// The given attribute of every match, in document order.
    fn attr_all(&self, selector: &str, attr: &str) -> Vec<String>;

    /// Click the first match if it shows up within `timeout`; reports whether
    /// a click happened.
    async fn click_first(&self, selector: &str, timeout: Duration) -> bool;
}

/// Opens pages. One instance is shared across all concurrent crawl tasks.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Page>, FetchError>;
}
