use std::sync::Arc;

use anyhow::{Context, Result};
use jobscout::{
    api::{self, AppState},
    browser::HttpBrowser,
    config::Config,
    embedding::HttpEmbedder,
    pipeline::Pipeline,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let embedder = HttpEmbedder::new(
        config.embed_endpoint(),
        config.embed_model(),
        config.embed_dimensions(),
        config.embed_api_key().map(str::to_string),
    );
    let bind_addr = config.bind_addr().to_string();
    let pipeline = Pipeline::new(config, Arc::new(HttpBrowser::new()), Arc::new(embedder));

    let app = api::router(AppState::new(Arc::new(pipeline)));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "dashboard api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
