//! Job-description normalization for embedding.
//!
//! Descriptions arrive as page text full of company pitches, benefits lists,
//! and legal boilerplate that drown the signal the matcher cares about. The
//! cleaner walks the text line by line, switching blocks on and off at
//! section headers: requirement/responsibility sections stay, company/perks/
//! legal sections go. The result is truncated to a soft length limit at a
//! line boundary so the embedding input never ends mid-sentence.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::entities::{EmbeddableJob, JobDetail, JobRef};

/// Soft cap on cleaned text, roughly 2000 tokens.
const MAX_CLEANED_CHARS: usize = 8000;
const TRUNCATION_MARK: &str = "[truncated]";

/// Cleaned text shorter than this is probably an extraction problem worth a
/// warning in the run log.
const SHORT_TEXT_CHARS: usize = 50;

/// Headers that open a section worth keeping.
static KEEP_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"requirements",
        r"qualifications",
        r"what you need",
        r"who you are",
        r"what we look for",
        r"responsibilities",
        r"what you will do",
        r"duties",
        r"skills",
        r"tech stack",
        r"technologies",
        r"minimum",
        r"preferred",
        r"about the role",
        r"the role",
        r"job summary",
        r"your profile",
        r"ideal candidate",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Headers that open a section to drop.
static SKIP_HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"about us",
        r"about the company",
        r"about",
        r"benefits",
        r"perks",
        r"what we offer",
        r"compensation",
        r"salary",
        r"how to apply",
        r"interview process",
        r"culture",
        r"why join",
        r"legal",
        r"location",
        r"equal opportunity",
        r"who we are",
        r"what the company does",
        r"company description",
        r"privacy",
        r"gdpr",
        r"data protection",
        r"background check",
        r"accessibility",
        r"diversity",
        r"inclusion",
        r"eeo",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BULLET_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[\*•]\s+").unwrap());

/// Keep only relevant sections of a job description and bound its length.
/// Pure: same text in, same text out.
pub fn clean_description(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut kept_lines: Vec<String> = Vec::new();
    // The intro usually carries the role summary, so blocks start on.
    let mut keep_block = true;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if looks_like_header(line) {
            let lower = line.to_lowercase();
            // Keep wins over skip so "about the role" survives the plain
            // "about" skip pattern.
            if KEEP_HEADERS.iter().any(|p| p.is_match(&lower)) {
                keep_block = true;
                kept_lines.push(line.to_string());
                continue;
            }
            if SKIP_HEADERS.iter().any(|p| p.is_match(&lower)) {
                keep_block = false;
                continue;
            }
        }

        if keep_block {
            kept_lines.push(BULLET_REGEX.replace(line, "- ").into_owned());
        }
    }

    truncate_at_line(kept_lines.join("\n"), MAX_CLEANED_CHARS)
}

/// Short line, capitalized or colon-terminated: the header heuristic the
/// section switch keys on.
fn looks_like_header(line: &str) -> bool {
    line.chars().count() < 60
        && (line.chars().next().is_some_and(|c| c.is_uppercase()) || line.ends_with(':'))
}

/// Cut at the nearest line boundary before `max_chars` and annotate, never
/// mid-line.
fn truncate_at_line(text: String, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text;
    }
    let cut = match text[..max_chars].rfind('\n') {
        Some(idx) => idx,
        // A single line longer than the limit: fall back to a char boundary.
        None => {
            let mut idx = max_chars;
            while !text.is_char_boundary(idx) {
                idx -= 1;
            }
            idx
        }
    };
    format!("{}\n{}", &text[..cut], TRUNCATION_MARK)
}

/// Derive the embeddable corpus from the detail store, in URL-store order so
/// downstream tie-breaking is deterministic. The title is prepended to the
/// cleaned text for embedding context.
pub fn build_corpus(refs: &[JobRef], details: &HashMap<String, JobDetail>) -> Vec<EmbeddableJob> {
    refs.iter()
        .filter_map(|job_ref| details.get(&job_ref.url))
        .map(|detail| {
            let cleaned = clean_description(&detail.description);
            if cleaned.len() < SHORT_TEXT_CHARS {
                warn!(url = %detail.url, chars = cleaned.len(), "cleaned text is very short");
            }
            EmbeddableJob {
                url: detail.url.clone(),
                title: detail.title.clone(),
                cleaned_text: format!("{}\n\n{}", detail.title, cleaned),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn keeps_requirement_sections_drops_company_noise() {
        let text = "We build rockets.\n\
                    Requirements:\n\
                    * 3 years of Rust\n\
                    * Async experience\n\
                    About us\n\
                    Founded in 2010 we are a family.\n\
                    Benefits\n\
                    Free snacks.\n\
                    Responsibilities\n\
                    - Ship features\n";
        let cleaned = clean_description(text);

        assert!(cleaned.contains("Requirements:"));
        assert!(cleaned.contains("- 3 years of Rust"));
        assert!(cleaned.contains("- Ship features"));
        assert!(!cleaned.contains("family"));
        assert!(!cleaned.contains("snacks"));
        // The intro before any header is kept.
        assert!(cleaned.contains("We build rockets."));
    }

    #[test]
    fn about_the_role_survives_about_skip() {
        let text = "About the role\nYou will own the ingestion pipeline.\nAbout us\nWe are nice.";
        let cleaned = clean_description(text);
        assert!(cleaned.contains("About the role"));
        assert!(cleaned.contains("ingestion pipeline"));
        assert!(!cleaned.contains("We are nice"));
    }

    #[test]
    fn normalizes_bullets() {
        let cleaned = clean_description("Skills\n* Rust\n• Tokio\n");
        assert!(cleaned.contains("- Rust"));
        assert!(cleaned.contains("- Tokio"));
        assert!(!cleaned.contains('*'));
        assert!(!cleaned.contains('•'));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(clean_description(""), "");
    }

    #[test]
    fn truncates_at_line_boundary_with_annotation() {
        // Many lines of requirement text, comfortably over the limit.
        let line = "- knows one more obscure corner of the borrow checker";
        let mut text = String::from("Requirements\n");
        while text.len() < MAX_CLEANED_CHARS * 2 {
            text.push_str(line);
            text.push('\n');
        }

        let cleaned = clean_description(&text);
        assert!(cleaned.len() <= MAX_CLEANED_CHARS + TRUNCATION_MARK.len() + 1);
        assert!(cleaned.ends_with(TRUNCATION_MARK));

        // The line before the marker is a whole line, never a prefix of one.
        let before_mark = cleaned
            .lines()
            .rev()
            .nth(1)
            .expect("truncated text has content before the marker");
        assert_eq!(before_mark, line);
    }

    #[test]
    fn single_overlong_line_still_annotated() {
        let text = "x".repeat(MAX_CLEANED_CHARS + 100);
        let cleaned = clean_description(&text);
        assert!(cleaned.ends_with(TRUNCATION_MARK));
    }

    #[test]
    fn corpus_follows_ref_order_and_prepends_title() {
        let refs = vec![
            JobRef {
                site: "a".to_string(),
                url: "https://x.example/2".to_string(),
                found_at: Utc::now(),
            },
            JobRef {
                site: "a".to_string(),
                url: "https://x.example/1".to_string(),
                found_at: Utc::now(),
            },
        ];
        let mut details = HashMap::new();
        for (url, title) in [("https://x.example/1", "One"), ("https://x.example/2", "Two")] {
            details.insert(
                url.to_string(),
                JobDetail {
                    url: url.to_string(),
                    title: title.to_string(),
                    description: "Requirements\n- Rust experience and distributed systems"
                        .to_string(),
                    scraped_at: Utc::now(),
                    seen: false,
                    last_seen: None,
                },
            );
        }

        let corpus = build_corpus(&refs, &details);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[0].title, "Two");
        assert_eq!(corpus[1].title, "One");
        assert!(corpus[0].cleaned_text.starts_with("Two\n\n"));
    }

    #[test]
    fn corpus_skips_unenriched_refs() {
        let refs = vec![JobRef {
            site: "a".to_string(),
            url: "https://x.example/missing".to_string(),
            found_at: Utc::now(),
        }];
        let corpus = build_corpus(&refs, &HashMap::new());
        assert!(corpus.is_empty());
    }
}
