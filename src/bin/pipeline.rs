use std::sync::Arc;

use anyhow::{Result, bail};
use jobscout::{
    browser::HttpBrowser,
    config::Config,
    embedding::HttpEmbedder,
    pipeline::Pipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let embedder = HttpEmbedder::new(
        config.embed_endpoint(),
        config.embed_model(),
        config.embed_dimensions(),
        config.embed_api_key().map(str::to_string),
    );
    let pipeline = Pipeline::new(config, Arc::new(HttpBrowser::new()), Arc::new(embedder));

    // Stage selection: a single positional argument, defaulting to the full
    // run.
    let stage = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());
    match stage.as_str() {
        "discover" => {
            let outcome = pipeline.run_discovery().await?;
            println!(
                "discovered {} new urls ({} sites ok, {} failed)",
                outcome.new_refs.len(),
                outcome.sites_ok,
                outcome.sites_failed
            );
        }
        "enrich" => {
            let outcome = pipeline.run_enrichment().await?;
            println!(
                "scraped {} details ({} re-seen, {} skipped, {} empty, {} failed)",
                outcome.scraped, outcome.reseen, outcome.skipped, outcome.empty, outcome.failed
            );
        }
        "normalize" => {
            let jobs = pipeline.run_normalize()?;
            println!("corpus rebuilt with {jobs} jobs");
        }
        "match" => {
            let matches = pipeline.run_matching().await?;
            println!("{} jobs above threshold", matches.len());
            for (i, record) in matches.iter().take(10).enumerate() {
                println!("{}. [{:.3}] {}", i + 1, record.score, record.title);
            }
        }
        "all" => {
            pipeline.run_all().await?;
            println!("full run completed");
        }
        other => bail!("unknown stage {other:?} (expected discover|enrich|normalize|match|all)"),
    }

    Ok(())
}
