use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, ClientBuilder};
use tracing::instrument;
use url::Url;

use crate::browser::errors::FetchError;

const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                    .parse()
                    .unwrap(),
            );
            headers
        })
        .build()
        .expect("Failed to build HTTP client")
});

static META_CHARSET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>;]+)"#).unwrap()
});

/// Fetch a page and decode it to UTF-8, returning the final URL after
/// redirects alongside the body. The final URL is what relative links must be
/// resolved against.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_html(url: &str, timeout: Duration) -> Result<(Url, String), FetchError> {
    let parsed_url = Url::parse(url)?;

    let response = HTTP_CLIENT
        .get(parsed_url)
        .timeout(timeout)
        .send()
        .await
        .map_err(FetchError::from_reqwest_error)?;

    if let Some(content_length) = response.content_length()
        && content_length > MAX_BODY_SIZE
    {
        return Err(FetchError::BodyTooLarge(content_length));
    }

    let final_url = response.url().clone();
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http { status });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("text/html")
        .to_string();
    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
        return Err(FetchError::UnsupportedContentType(content_type));
    }

    let body_bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Io(e.to_string()))?;
    if body_bytes.len() as u64 > MAX_BODY_SIZE {
        return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
    }

    let body = decode_body(&body_bytes, &content_type)?;
    Ok((final_url, body))
}

/// Decode raw bytes to UTF-8, sniffing the charset from the Content-Type
/// header, a `<meta charset>` tag in the first 4KB, or chardetng as a last
/// resort.
fn decode_body(body_bytes: &bytes::Bytes, content_type: &str) -> Result<String, FetchError> {
    let encoding = charset_label(content_type)
        .or_else(|| {
            let head = &body_bytes[..body_bytes.len().min(4096)];
            charset_label(&String::from_utf8_lossy(head))
        })
        .unwrap_or_else(|| {
            let head = &body_bytes[..body_bytes.len().min(4096)];
            let mut detector = chardetng::EncodingDetector::new();
            detector.feed(head, false);
            detector.guess(None, true)
        });

    let (decoded, _, had_errors) = encoding.decode(body_bytes);
    if had_errors {
        return Err(FetchError::Decode(encoding.name().to_string()));
    }
    Ok(decoded.into_owned())
}

/// Pull a `charset=` label out of a Content-Type value or an HTML head
/// fragment and look it up in the encoding table.
fn charset_label(text: &str) -> Option<&'static encoding_rs::Encoding> {
    // Encoding labels are ASCII, so matching on a lowercased copy is safe.
    let lower = text.to_lowercase();
    let label = if let Some(pos) = lower.find("charset=") {
        let rest = lower[pos + "charset=".len()..].trim_start_matches(['"', '\'']);
        let end = rest
            .find(|c: char| c == ';' || c == '"' || c == '\'' || c == '>' || c.is_whitespace())
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    } else {
        META_CHARSET_REGEX
            .captures(&lower)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }?;
    encoding_rs::Encoding::for_label(label.as_bytes())
}
