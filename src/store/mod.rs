//! JSON-file persistence for the four stores: discovered URLs, enriched
//! details, embeddable corpus, and the match snapshot.
//!
//! Loads of missing files yield empty collections so a first run needs no
//! setup. Every save goes through a sibling temp file and an atomic rename,
//! so a concurrent reader (the dashboard) never observes a partially-written
//! file and a crash mid-write never corrupts previously-good state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::entities::{EmbeddableJob, JobDetail, JobRef, MatchRecord, StoreStats};

const URLS_FILE: &str = "urls.json";
const DETAILS_FILE: &str = "details.json";
const CORPUS_FILE: &str = "corpus.json";
const MATCHES_FILE: &str = "matches.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle to the data directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ordered sequence of every JobRef ever discovered, unique by url.
    pub fn load_refs(&self) -> Result<Vec<JobRef>, StoreError> {
        self.load_or_default(URLS_FILE)
    }

    pub fn save_refs(&self, refs: &[JobRef]) -> Result<(), StoreError> {
        self.save(URLS_FILE, &refs)
    }

    /// url → JobDetail for every successfully enriched URL.
    pub fn load_details(&self) -> Result<HashMap<String, JobDetail>, StoreError> {
        self.load_or_default(DETAILS_FILE)
    }

    pub fn save_details(&self, details: &HashMap<String, JobDetail>) -> Result<(), StoreError> {
        self.save(DETAILS_FILE, details)
    }

    /// Embeddable corpus in URL-store order (the match tie-break order).
    pub fn load_corpus(&self) -> Result<Vec<EmbeddableJob>, StoreError> {
        self.load_or_default(CORPUS_FILE)
    }

    pub fn save_corpus(&self, corpus: &[EmbeddableJob]) -> Result<(), StoreError> {
        self.save(CORPUS_FILE, &corpus)
    }

    /// Current match snapshot, descending by score.
    pub fn load_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        self.load_or_default(MATCHES_FILE)
    }

    /// Full replacement: jobs that stopped clearing the threshold are gone
    /// after this call.
    pub fn save_matches(&self, matches: &[MatchRecord]) -> Result<(), StoreError> {
        self.save(MATCHES_FILE, &matches)
    }

    /// Current counts for the observability surface.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let refs = self.load_refs()?;
        let details = self.load_details()?;

        let mut per_site: HashMap<String, usize> = HashMap::new();
        for job_ref in &refs {
            *per_site.entry(job_ref.site.clone()).or_default() += 1;
        }
        let seen_count = details.values().filter(|d| d.seen).count();

        Ok(StoreStats {
            urls_known: refs.len(),
            details_known: details.len(),
            seen_count,
            per_site,
        })
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let path = self.dir.join(name);
        let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;

        // Write-then-rename keeps the visible file whole at all times.
        let tmp = self.dir.join(format!("{name}.tmp"));
        fs::write(&tmp, body).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &path).map_err(|source| io_error(&path, source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
