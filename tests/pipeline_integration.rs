//! End-to-end pipeline runs against a mock job board and a mock embeddings
//! endpoint: discovery dedup, enrichment idempotence across reruns, corpus
//! regeneration, and history-preserving match snapshots.

use std::fs;
use std::sync::{Arc, Mutex};

use jobscout::{
    browser::HttpBrowser,
    config::{self, Config},
    embedding::HttpEmbedder,
    entities::MatchStatus,
    pipeline::Pipeline,
    store::Store,
};
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

/// Serializes the env-var window in which each test builds its Config.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Embeddings endpoint stand-in: anything mentioning "Frontend" is
/// orthogonal to everything else, so frontend jobs score 0 against the
/// résumé and the rest score 1.
struct EmbedResponder;

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let data: Vec<serde_json::Value> = body["input"]
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_str().unwrap_or_default();
                let embedding = if text.contains("Frontend") {
                    [0.0, 1.0]
                } else {
                    [1.0, 0.0]
                };
                serde_json::json!({"index": index, "embedding": embedding})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": data}))
    }
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_bytes(format!("<html><body>{body}</body></html>").into_bytes())
        .insert_header("Content-Type", "text/html; charset=utf-8")
}

fn detail_page(title: &str, description: &str) -> ResponseTemplate {
    html_page(&format!(
        r#"<h1>{title}</h1><div class="desc">{description}</div>"#
    ))
}

/// Build a Config pointed at the temp data dir and the mock embeddings
/// endpoint.
fn test_config(data_dir: &std::path::Path, embed_endpoint: &str) -> Config {
    let _guard = ENV_MUTEX.lock().unwrap();
    let vars = [
        (config::ENV_DATA_DIR, data_dir.to_str().unwrap().to_string()),
        (config::ENV_EMBED_ENDPOINT, embed_endpoint.to_string()),
        (config::ENV_EMBED_DIMENSIONS, "2".to_string()),
        (config::ENV_MATCH_THRESHOLD, "0.5".to_string()),
    ];
    for (key, value) in &vars {
        unsafe {
            std::env::set_var(key, value);
        }
    }
    let cfg = Config::from_env().unwrap();
    for (key, _) in &vars {
        unsafe {
            std::env::remove_var(key);
        }
    }
    cfg
}

fn test_pipeline(config: Config) -> Pipeline {
    let embedder = HttpEmbedder::new(
        config.embed_endpoint(),
        config.embed_model(),
        config.embed_dimensions(),
        None,
    );
    Pipeline::new(config, Arc::new(HttpBrowser::new()), Arc::new(embedder))
}

#[tokio::test]
async fn full_run_discovers_enriches_and_matches_with_history() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Two boards; board B lists one URL board A already has.
    Mock::given(method("GET"))
        .and(path("/board-a"))
        .respond_with(html_page(
            r#"<ul class="jobs">
                <li class="job"><a href="/job/1">Rust Engineer</a></li>
                <li class="job"><a href="/job/2">Frontend Developer</a></li>
            </ul>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board-b"))
        .respond_with(html_page(&format!(
            r#"<ul class="jobs">
                <li class="job"><a href="{base}/job/1">Rust Engineer</a></li>
                <li class="job"><a href="/job/3">Backend Engineer</a></li>
            </ul>"#
        )))
        .mount(&server)
        .await;

    // Detail pages. The expect(1) assertions are the idempotence probe: two
    // full runs, one fetch per URL.
    Mock::given(method("GET"))
        .and(path("/job/1"))
        .respond_with(detail_page(
            "Rust Engineer",
            "Requirements<p>- solid Rust, async, distributed systems experience</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/2"))
        .respond_with(detail_page(
            "Frontend Developer",
            "Requirements<p>- Frontend frameworks, CSS, design systems craft</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job/3"))
        .respond_with(detail_page(
            "Backend Engineer",
            "Requirements<p>- services, databases, message queues in production</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EmbedResponder)
        .mount(&server)
        .await;

    // Externally authored inputs.
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sites.json"),
        format!(
            r#"[
                {{
                    "name": "board-a",
                    "entry_url": "{base}/board-a",
                    "list_container_selector": "ul.jobs",
                    "list_item_selector": "li.job",
                    "item_link_selector": "a"
                }},
                {{
                    "name": "board-b",
                    "entry_url": "{base}/board-b",
                    "list_container_selector": "ul.jobs",
                    "list_item_selector": "li.job",
                    "item_link_selector": "a"
                }}
            ]"#
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("selectors.json"),
        r#"{
            "board-a": {"title_selector": "h1", "description_selector": "div.desc"},
            "board-b": {"title_selector": "h1", "description_selector": "div.desc"}
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("resume.md"),
        "Backend engineer, Rust and distributed systems.",
    )
    .unwrap();

    let pipeline = test_pipeline(test_config(
        dir.path(),
        &format!("{base}/v1/embeddings"),
    ));
    pipeline.run_all().await.unwrap();

    let store = Store::new(dir.path());

    // Dedup: three unique URLs across the two boards.
    let refs = store.load_refs().unwrap();
    assert_eq!(refs.len(), 3);
    let job1_refs: Vec<_> = refs.iter().filter(|r| r.url.ends_with("/job/1")).collect();
    assert_eq!(job1_refs.len(), 1);

    let details = store.load_details().unwrap();
    assert_eq!(details.len(), 3);
    assert!(details.values().all(|d| !d.seen));

    // The frontend job scores 0 and stays out; the other two are new
    // matches.
    let matches = store.load_matches().unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m.is_new));
    assert!(matches.iter().all(|m| m.status == MatchStatus::Matched));
    assert!(!matches.iter().any(|m| m.title.contains("Frontend")));
    let first_matched_at = matches[0].matched_at;
    let first_url = matches[0].url.clone();

    // The user views one match between runs.
    let mut snapshot = store.load_matches().unwrap();
    snapshot[0].status = MatchStatus::Viewed;
    snapshot[0].is_new = false;
    store.save_matches(&snapshot).unwrap();

    // Second full run: no re-fetches (the expect(1) mocks verify on drop),
    // details flip to seen, history survives the snapshot rebuild.
    pipeline.run_all().await.unwrap();

    let details = store.load_details().unwrap();
    assert!(details.values().all(|d| d.seen && d.last_seen.is_some()));

    let matches = store.load_matches().unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| !m.is_new));
    let viewed = matches.iter().find(|m| m.url == first_url).unwrap();
    assert_eq!(viewed.status, MatchStatus::Viewed);
    assert_eq!(viewed.matched_at, first_matched_at);
}

#[tokio::test]
async fn missing_resume_aborts_matching_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = test_pipeline(test_config(dir.path(), "http://127.0.0.1:1/v1/embeddings"));

    let err = pipeline.run_matching().await.unwrap_err();
    assert!(format!("{err:#}").contains("resume not found"));

    // Nothing was written.
    assert!(!dir.path().join("matches.json").exists());
}

#[tokio::test]
async fn discovery_persists_partial_progress_when_a_site_fails() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(html_page(
            r#"<ul class="jobs"><li class="job"><a href="/job/9">x</a></li></ul>"#,
        ))
        .mount(&server)
        .await;
    // "/down" is not mounted and returns 404.

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("sites.json"),
        format!(
            r#"[
                {{
                    "name": "down",
                    "entry_url": "{base}/down",
                    "list_container_selector": "ul.jobs",
                    "list_item_selector": "li.job",
                    "item_link_selector": "a"
                }},
                {{
                    "name": "up",
                    "entry_url": "{base}/up",
                    "list_container_selector": "ul.jobs",
                    "list_item_selector": "li.job",
                    "item_link_selector": "a"
                }}
            ]"#
        ),
    )
    .unwrap();

    let pipeline = test_pipeline(test_config(dir.path(), "http://127.0.0.1:1/v1/embeddings"));
    let outcome = pipeline.run_discovery().await.unwrap();

    assert_eq!(outcome.sites_ok, 1);
    assert_eq!(outcome.sites_failed, 1);

    // The healthy site's result reached disk regardless of the failure.
    let refs = Store::new(dir.path()).load_refs().unwrap();
    assert_eq!(refs.len(), 1);
    assert!(refs[0].url.ends_with("/job/9"));
}
