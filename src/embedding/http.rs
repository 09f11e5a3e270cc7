use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::embedding::{EmbedError, Embedder};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One oversized request can hit provider payload limits, so inputs are sent
/// in transport sub-batches. Scores are unaffected: the model embeds each
/// input independently.
const MAX_BATCH: usize = 100;

static EMBED_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build embeddings HTTP client")
});

/// Embedder over an OpenAI-compatible `/v1/embeddings` endpoint (OpenAI,
/// Azure, LM Studio, vLLM, Ollama in compat mode, ...).
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        api_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            dimensions,
            api_key,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut request = EMBED_CLIENT.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                sent: texts.len(),
                got: parsed.data.len(),
            });
        }

        // The API is allowed to reorder rows; `index` is authoritative.
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);

        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            if row.embedding.len() != self.dimensions {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dimensions,
                    got: row.embedding.len(),
                });
            }
            vectors.push(row.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip_all, fields(texts = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            debug!(chunk = chunk.len(), "embedding sub-batch");
            vectors.extend(self.embed_batch(chunk).await?);
        }
        Ok(vectors)
    }
}
