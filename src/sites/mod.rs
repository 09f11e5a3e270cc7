//! Externally authored crawl configuration: which listing pages to visit,
//! how to find job links on them, and where title/description live on each
//! site's detail pages.
//!
//! `sites.json` is an ordered array:
//!
//! ```json
//! [{
//!   "name": "remote ok",
//!   "entry_url": "https://remoteok.com/remote-rust-jobs",
//!   "list_container_selector": "table#jobsboard",
//!   "list_item_selector": "tr.job",
//!   "item_link_selector": "a.preventLink"
//! }]
//! ```
//!
//! `selectors.json` is a map keyed by site key:
//!
//! ```json
//! {
//!   "remoteOk": {
//!     "title_selector": "h2",
//!     "description_selector": "div.description",
//!     "expand_selector": "a.expand"
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How to locate a listing page's job items and their links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Stable key, also used (through the alias table) to look up the
    /// detail-extraction selector set.
    pub name: String,
    pub entry_url: String,
    pub list_container_selector: String,
    pub list_item_selector: String,
    pub item_link_selector: String,
}

/// Where, within a detail page, to find the title and description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSet {
    pub title_selector: String,
    pub description_selector: String,
    /// Optional control to click before extraction (e.g. a "Read more"
    /// toggle that expands a truncated description). Absence of the element
    /// on the page is not an error.
    #[serde(default)]
    pub expand_selector: Option<String>,
}

/// Site names as discovered may differ lexically from the keys used in the
/// selector map (case/spacing variants accumulated over time). Unlisted
/// names resolve to themselves.
const SITE_KEY_ALIASES: &[(&str, &str)] = &[
    ("remote ok", "remoteOk"),
    ("hire lebanese", "hireLebanese"),
    ("we work remotely", "WWR"),
];

/// Resolve a JobRef site name to its selector-map key.
pub fn selector_key(site_name: &str) -> &str {
    SITE_KEY_ALIASES
        .iter()
        .find(|(from, _)| *from == site_name)
        .map(|(_, to)| *to)
        .unwrap_or(site_name)
}

#[derive(Error, Debug)]
pub enum SiteConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load the ordered list of site configurations.
pub fn load_sites(path: &Path) -> Result<Vec<SiteConfig>, SiteConfigError> {
    read_json(path)
}

/// Load the site-key → selector-set map.
pub fn load_selectors(path: &Path) -> Result<HashMap<String, SelectorSet>, SiteConfigError> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SiteConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SiteConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SiteConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
