// src/core/scanner/response_analyzer.rs

use crate::core::knowledge_base::{TITLE_ELLIPSIS, TITLE_MAX_LEN, UNKNOWN_TITLE};
use crate::core::models::DetectionResult;
use crate::core::scanner::favicon::resolve_favicon;
use crate::core::scanner::fingerprint_scanner::FingerprintEngine;
use crate::core::scanner::http_fetcher::{HttpFetcher, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, LOCATION};
use std::sync::Arc;
use std::time::Duration;

static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// Everything derived from one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub title: String,
    pub favicon_url: String,
    pub favicon_hash: String,
    pub content_length: usize,
    pub detections: Vec<DetectionResult>,
}

/// Derives a display title from a response.
///
/// # Arguments
/// * `status` - Status code; 206 is treated as 200.
/// * `content_type` - The `Content-Type` header, if any.
/// * `body` - Decoded body text.
/// * `location` - The `Location` header, used for 3xx responses.
///
/// # Returns
/// `"<code>-> <location>"` for redirects, the flattened body for JSON, plain
/// or untyped responses, the `<title>` text for HTML, otherwise `Unknown Title`.
pub fn extract_title(status: u16, content_type: Option<&str>, body: &str, location: Option<&str>) -> String {
    let status = if status == 206 { 200 } else { status };
    if (300..400).contains(&status) {
        return format!("{status}-> {}", location.unwrap_or_default());
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.is_empty() || content_type.contains("json") || content_type.contains("plain") {
        return truncate_title(&flatten(body));
    }
    if content_type.contains("html") {
        if let Some(title) = RE_TITLE.captures(body).and_then(|c| c.get(1)) {
            return truncate_title(&collapse_whitespace(title.as_str()));
        }
    }
    UNKNOWN_TITLE.to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace runs (newlines included) to single spaces and drops brackets.
fn flatten(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.replace(['[', ']'], ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the first `TITLE_MAX_LEN` characters, marking the cut with an ellipsis.
pub fn truncate_title(title: &str) -> String {
    match title.char_indices().nth(TITLE_MAX_LEN) {
        Some((cut, _)) => format!("{}{TITLE_ELLIPSIS}", &title[..cut]),
        None => title.to_string(),
    }
}

/// Declared `Content-Length` when it parses, otherwise the buffered body size.
pub fn content_length(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(body_len)
}

/// Turns pages into [`Analysis`] values: title, favicon, length, detections.
#[derive(Clone)]
pub struct ResponseAnalyzer {
    fetcher: HttpFetcher,
    engine: Arc<FingerprintEngine>,
    favicon_retries: u32,
    retry_delay: Duration,
}

impl ResponseAnalyzer {
    pub fn new(fetcher: HttpFetcher, engine: Arc<FingerprintEngine>, favicon_retries: u32, retry_delay: Duration) -> Self {
        Self { fetcher, engine, favicon_retries, retry_delay }
    }

    /// `path` is the endpoint path the rules see under the `path` location.
    pub async fn analyze(&self, page: &Page, path: &str) -> Analysis {
        let title = extract_title(
            page.status.as_u16(),
            page.content_type(),
            &page.body,
            page.header_str(LOCATION),
        );
        let favicon =
            resolve_favicon(&self.fetcher, &page.request, &page.body, self.favicon_retries, self.retry_delay).await;
        let content_length = content_length(&page.headers, page.bytes.len());
        let detections = self.engine.detect(&page.headers, &page.body, &title, &favicon.hash, path);

        Analysis {
            title,
            favicon_url: favicon.url,
            favicon_hash: favicon.hash,
            content_length,
            detections,
        }
    }
}
