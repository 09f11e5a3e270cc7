//! Configuration handling for the application.
//!
//! Everything is read from environment variables with development defaults,
//! so a fresh checkout runs against a local `data/` directory without any
//! setup. `Config::from_env` performs the loading and validates the numeric
//! knobs.

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable names. Public so tests and binaries can refer to them.
pub const ENV_DATA_DIR: &str = "JOBSCOUT_DATA_DIR";
pub const ENV_SITES_PATH: &str = "JOBSCOUT_SITES_PATH";
pub const ENV_SELECTORS_PATH: &str = "JOBSCOUT_SELECTORS_PATH";
pub const ENV_RESUME_PATH: &str = "JOBSCOUT_RESUME_PATH";
pub const ENV_BIND_ADDR: &str = "JOBSCOUT_BIND_ADDR";
pub const ENV_EMBED_ENDPOINT: &str = "JOBSCOUT_EMBED_ENDPOINT";
pub const ENV_EMBED_MODEL: &str = "JOBSCOUT_EMBED_MODEL";
pub const ENV_EMBED_DIMENSIONS: &str = "JOBSCOUT_EMBED_DIMENSIONS";
pub const ENV_EMBED_API_KEY: &str = "JOBSCOUT_EMBED_API_KEY";
pub const ENV_FETCH_CONCURRENCY: &str = "JOBSCOUT_FETCH_CONCURRENCY";
pub const ENV_MATCH_THRESHOLD: &str = "JOBSCOUT_MATCH_THRESHOLD";
pub const ENV_MATCH_TOP_N: &str = "JOBSCOUT_MATCH_TOP_N";
pub const ENV_EXCLUDE_TITLES: &str = "JOBSCOUT_EXCLUDE_TITLES";

/// Default development values used when environment variables are absent.
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_EMBED_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBED_DIMENSIONS: usize = 1536;
const DEFAULT_FETCH_CONCURRENCY: usize = 10;
const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
const DEFAULT_MATCH_TOP_N: usize = 100;
const DEFAULT_EXCLUDE_TITLES: &str = "senior";

/// Application runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    data_dir: PathBuf,
    sites_path: PathBuf,
    selectors_path: PathBuf,
    resume_path: PathBuf,
    bind_addr: String,
    embed_endpoint: String,
    embed_model: String,
    embed_dimensions: usize,
    embed_api_key: Option<String>,
    fetch_concurrency: usize,
    match_threshold: f32,
    match_top_n: usize,
    exclude_title_keywords: Vec<String>,
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    /// File paths default to siblings of the data directory so one variable
    /// relocates the whole working set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir =
            PathBuf::from(env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()));
        let sites_path = path_var(ENV_SITES_PATH, &data_dir, "sites.json");
        let selectors_path = path_var(ENV_SELECTORS_PATH, &data_dir, "selectors.json");
        let resume_path = path_var(ENV_RESUME_PATH, &data_dir, "resume.md");
        let bind_addr = env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let embed_endpoint =
            env::var(ENV_EMBED_ENDPOINT).unwrap_or_else(|_| DEFAULT_EMBED_ENDPOINT.to_string());
        let embed_model =
            env::var(ENV_EMBED_MODEL).unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let embed_dimensions =
            parse_var(ENV_EMBED_DIMENSIONS, DEFAULT_EMBED_DIMENSIONS, "embed_dimensions")?;
        let embed_api_key = env::var(ENV_EMBED_API_KEY).ok().filter(|k| !k.is_empty());

        let fetch_concurrency =
            parse_var(ENV_FETCH_CONCURRENCY, DEFAULT_FETCH_CONCURRENCY, "fetch_concurrency")?;
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        let match_threshold =
            parse_var(ENV_MATCH_THRESHOLD, DEFAULT_MATCH_THRESHOLD, "match_threshold")?;
        if !(0.0..=1.0).contains(&match_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "match_threshold",
                reason: format!("{match_threshold} is outside [0, 1]"),
            });
        }
        let match_top_n = parse_var(ENV_MATCH_TOP_N, DEFAULT_MATCH_TOP_N, "match_top_n")?;

        let exclude_title_keywords = env::var(ENV_EXCLUDE_TITLES)
            .unwrap_or_else(|_| DEFAULT_EXCLUDE_TITLES.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            data_dir,
            sites_path,
            selectors_path,
            resume_path,
            bind_addr,
            embed_endpoint,
            embed_model,
            embed_dimensions,
            embed_api_key,
            fetch_concurrency,
            match_threshold,
            match_top_n,
            exclude_title_keywords,
        })
    }

    /// Directory holding the persisted URL/detail/corpus/match stores.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
    /// JSON array of site configurations (externally authored).
    pub fn sites_path(&self) -> &Path {
        &self.sites_path
    }
    /// JSON map of per-site detail-page selector sets (externally authored).
    pub fn selectors_path(&self) -> &Path {
        &self.selectors_path
    }
    /// The candidate's résumé as plain text / markdown.
    pub fn resume_path(&self) -> &Path {
        &self.resume_path
    }
    /// TCP bind address (host:port) for the dashboard API.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }
    /// OpenAI-compatible embeddings endpoint.
    pub fn embed_endpoint(&self) -> &str {
        &self.embed_endpoint
    }
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }
    pub fn embed_dimensions(&self) -> usize {
        self.embed_dimensions
    }
    pub fn embed_api_key(&self) -> Option<&str> {
        self.embed_api_key.as_deref()
    }
    /// Upper bound on simultaneously in-flight detail fetches.
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }
    /// Minimum cosine similarity for a job to enter the match snapshot.
    pub fn match_threshold(&self) -> f32 {
        self.match_threshold
    }
    /// Maximum number of records kept in the match snapshot.
    pub fn match_top_n(&self) -> usize {
        self.match_top_n
    }
    /// Lowercased keywords that exclude a job by title before embedding.
    pub fn exclude_title_keywords(&self) -> &[String] {
        &self.exclude_title_keywords
    }
}

fn path_var(key: &str, data_dir: &Path, default_name: &str) -> PathBuf {
    env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join(default_name))
}

fn parse_var<T>(key: &str, default: T, field: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field,
            reason: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}

/// Serializes every test that touches process environment variables, across
/// all modules of the crate.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
