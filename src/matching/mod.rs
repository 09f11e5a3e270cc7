//! Résumé ↔ job similarity scoring and history-preserving snapshot merge.
//!
//! Scores and descriptions are recomputed every run; `matched_at`, `status`,
//! and novelty are what the merge protects. The output is a complete
//! replacement snapshot: a job whose score no longer clears the threshold
//! simply vanishes from it.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::embedding::{EmbedError, Embedder, cosine_similarity};
use crate::entities::{EmbeddableJob, MatchRecord, MatchStatus};

#[derive(Error, Debug)]
pub enum MatchError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("embedder returned no vector for the resume")]
    MissingResumeVector,
}

#[derive(Debug, Clone)]
pub struct MatchParams {
    /// Minimum cosine similarity for inclusion; exact equality is included.
    pub threshold: f32,
    /// Snapshot size cap after ranking.
    pub top_n: usize,
    /// Lowercased substrings that exclude a job by title before embedding.
    pub exclude_title_keywords: Vec<String>,
}

/// Score the corpus against the résumé and produce the next match snapshot,
/// descending by score, ties in corpus order.
///
/// `previous` is the prior snapshot keyed by url; records still clearing the
/// threshold keep their `matched_at`/`status` and come back with
/// `is_new=false`.
pub async fn rank_matches(
    embedder: &dyn Embedder,
    resume_text: &str,
    corpus: &[EmbeddableJob],
    previous: &HashMap<String, MatchRecord>,
    params: &MatchParams,
) -> Result<Vec<MatchRecord>, MatchError> {
    // Title exclusion is a pure pre-step, independent of embedding.
    let candidates: Vec<&EmbeddableJob> = corpus
        .iter()
        .filter(|job| {
            let title = job.title.to_lowercase();
            let excluded = params
                .exclude_title_keywords
                .iter()
                .any(|kw| title.contains(kw));
            if excluded {
                debug!(url = %job.url, title = %job.title, "excluded by title keyword");
            }
            !excluded
        })
        .collect();

    info!(
        total = corpus.len(),
        candidates = candidates.len(),
        "matching jobs against resume"
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    // The résumé embeds once; the job texts go as one batch. Batching is a
    // performance contract only, the per-item scores are identical.
    let resume_input = [resume_text.to_string()];
    let resume_vector = embedder
        .embed(&resume_input)
        .await?
        .into_iter()
        .next()
        .ok_or(MatchError::MissingResumeVector)?;

    let job_texts: Vec<String> = candidates.iter().map(|j| j.cleaned_text.clone()).collect();
    let job_vectors = embedder.embed(&job_texts).await?;

    let now = Utc::now();
    let mut matches: Vec<MatchRecord> = Vec::new();
    for (job, vector) in candidates.iter().zip(job_vectors.iter()) {
        let score = cosine_similarity(&resume_vector, vector);
        if score < params.threshold {
            continue;
        }

        let record = match previous.get(&job.url) {
            Some(prior) => MatchRecord {
                url: job.url.clone(),
                title: job.title.clone(),
                score,
                description: job.cleaned_text.clone(),
                matched_at: prior.matched_at,
                is_new: false,
                status: prior.status,
            },
            None => MatchRecord {
                url: job.url.clone(),
                title: job.title.clone(),
                score,
                description: job.cleaned_text.clone(),
                matched_at: now,
                is_new: true,
                status: MatchStatus::Matched,
            },
        };
        matches.push(record);
    }

    // Stable sort: equal scores keep first-seen corpus order.
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(params.top_n);

    info!(
        matched = matches.len(),
        threshold = params.threshold,
        "match snapshot computed"
    );
    Ok(matches)
}
