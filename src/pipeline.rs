//! Stage orchestration: each stage loads its inputs from the store, runs its
//! engine, and persists its outputs, so every stage is independently
//! invokable and safe to re-run. A stage that cannot load a required input
//! fails with a contextual error before anything is written.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::Browser;
use crate::config::Config;
use crate::discovery::{self, DiscoveryOutcome};
use crate::embedding::Embedder;
use crate::enrichment::{self, EnrichOutcome};
use crate::entities::MatchRecord;
use crate::matching::{self, MatchParams};
use crate::normalizer;
use crate::sites;
use crate::store::Store;

pub struct Pipeline {
    config: Config,
    store: Store,
    browser: Arc<dyn Browser>,
    embedder: Arc<dyn Embedder>,
}

impl Pipeline {
    pub fn new(config: Config, browser: Arc<dyn Browser>, embedder: Arc<dyn Embedder>) -> Self {
        let store = Store::new(config.data_dir());
        Self {
            config,
            store,
            browser,
            embedder,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawl the configured listing pages and append newly discovered URLs
    /// to the URL store. Partial progress persists even when sites fail.
    pub async fn run_discovery(&self) -> Result<DiscoveryOutcome> {
        let sites = sites::load_sites(self.config.sites_path())
            .context("loading site configuration")?;
        let mut refs = self.store.load_refs().context("loading url store")?;
        let known: HashSet<String> = refs.iter().map(|r| r.url.clone()).collect();
        info!(sites = sites.len(), known = known.len(), "starting discovery");

        let outcome = discovery::discover(self.browser.clone(), &sites, &known).await;

        refs.extend(outcome.new_refs.iter().cloned());
        self.store.save_refs(&refs).context("persisting url store")?;
        info!(total = refs.len(), new = outcome.new_refs.len(), "url store updated");
        Ok(outcome)
    }

    /// Fetch details for URLs that lack them; mark the rest re-seen. The
    /// accumulated map is persisted once, after the batch.
    pub async fn run_enrichment(&self) -> Result<EnrichOutcome> {
        let selectors = sites::load_selectors(self.config.selectors_path())
            .context("loading selector configuration")?;
        let refs = self.store.load_refs().context("loading url store")?;
        let details = self.store.load_details().context("loading detail store")?;

        let (details, outcome) = enrichment::enrich(
            self.browser.clone(),
            &refs,
            details,
            &selectors,
            self.config.fetch_concurrency(),
        )
        .await;

        self.store
            .save_details(&details)
            .context("persisting detail store")?;
        info!(total = details.len(), "detail store updated");
        Ok(outcome)
    }

    /// Regenerate the embeddable corpus from the detail store.
    pub fn run_normalize(&self) -> Result<usize> {
        let refs = self.store.load_refs().context("loading url store")?;
        let details = self.store.load_details().context("loading detail store")?;

        let corpus = normalizer::build_corpus(&refs, &details);
        self.store.save_corpus(&corpus).context("persisting corpus")?;
        info!(jobs = corpus.len(), "corpus regenerated");
        Ok(corpus.len())
    }

    /// Score the corpus against the résumé and replace the match snapshot.
    pub async fn run_matching(&self) -> Result<Vec<MatchRecord>> {
        let resume_path = self.config.resume_path();
        let resume = std::fs::read_to_string(resume_path)
            .with_context(|| format!("resume not found at {}", resume_path.display()))?;

        let corpus = self.store.load_corpus().context("loading corpus")?;
        if corpus.is_empty() {
            warn!("corpus is empty or missing; keeping the previous match snapshot");
            return Ok(Vec::new());
        }
        let previous: HashMap<String, MatchRecord> = self
            .store
            .load_matches()
            .context("loading previous match snapshot")?
            .into_iter()
            .map(|m| (m.url.clone(), m))
            .collect();

        let params = MatchParams {
            threshold: self.config.match_threshold(),
            top_n: self.config.match_top_n(),
            exclude_title_keywords: self.config.exclude_title_keywords().to_vec(),
        };
        let matches =
            matching::rank_matches(self.embedder.as_ref(), &resume, &corpus, &previous, &params)
                .await
                .context("scoring jobs against resume")?;

        self.store
            .save_matches(&matches)
            .context("persisting match snapshot")?;
        info!(matches = matches.len(), "match snapshot replaced");
        Ok(matches)
    }

    /// The full run: discover, enrich, normalize, match.
    pub async fn run_all(&self) -> Result<()> {
        let discovery = self.run_discovery().await?;
        info!(
            new_urls = discovery.new_refs.len(),
            sites_failed = discovery.sites_failed,
            "discovery stage done"
        );

        let enrichment = self.run_enrichment().await?;
        info!(
            scraped = enrichment.scraped,
            reseen = enrichment.reseen,
            "enrichment stage done"
        );

        let corpus_size = self.run_normalize()?;
        info!(corpus_size, "normalize stage done");

        let matches = self.run_matching().await?;
        info!(matches = matches.len(), "matching stage done");
        Ok(())
    }
}
