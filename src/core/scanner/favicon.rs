// src/core/scanner/favicon.rs

use crate::core::error::FetchError;
use crate::core::knowledge_base::{FALLBACK_FAVICON, FAVICON_PATHS};
use crate::core::models::ScanRequest;
use crate::core::scanner::client_redirect::resolve_redirect;
use crate::core::scanner::http_fetcher::HttpFetcher;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

// Declared icon locations, most specific first.
static ICON_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r#"(?i)<link[^>]*?rel=["'][^"']*icon[^"']*["'][^>]*?href=["']?([^"'\s>]+)"#).unwrap(),
        Regex::new(r#"(?i)<link[^>]*?href=["']?([^"'\s>]+)["']?[^>]*?rel=["'][^"']*icon[^"']*["']"#).unwrap(),
        Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']?([^"'>]+)"#).unwrap(),
        Regex::new(r#"(?i)<meta[^>]+name=["']twitter:image["'][^>]+content=["']?([^"'>]+)"#).unwrap(),
    ]
});

/// Outcome of favicon discovery for one page. `hash` is empty when the icon
/// could not be fetched or was not an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favicon {
    pub url: String,
    pub hash: String,
}

/// Base64 (standard alphabet) broken into 76-character lines, each ending in
/// `\n`. This is the form internet-wide favicon hashes are computed over.
pub fn encode_favicon(bytes: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(bytes);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    for line in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}

/// murmur3 x86 32-bit (seed 0) of the encoded icon, as a signed decimal.
pub fn favicon_hash(bytes: &[u8]) -> String {
    let encoded = encode_favicon(bytes);
    match murmur3::murmur3_32(&mut Cursor::new(encoded), 0) {
        Ok(hash) => (hash as i32).to_string(),
        Err(_) => String::new(),
    }
}

/// First icon reference declared in the markup, skipping inline `data:` URIs.
pub fn declared_icon(body: &str) -> Option<String> {
    ICON_PATTERNS.iter().find_map(|re| {
        let href = re.captures(body)?.get(1)?.as_str().trim();
        (!href.is_empty() && !href.to_ascii_lowercase().starts_with("data:")).then(|| href.to_string())
    })
}

/// Finds the icon for the page served by `request`: declared links first,
/// then the conventional paths (HEAD-checked), then `/favicon.ico` unchecked.
pub async fn locate(fetcher: &HttpFetcher, request: &ScanRequest, body: &str) -> Option<ScanRequest> {
    if let Some(href) = declared_icon(body) {
        if let Some(found) = resolve_redirect(&href, request) {
            debug!(href = %href, "Favicon declared in page.");
            return Some(found);
        }
    }
    for path in FAVICON_PATHS {
        let Some(candidate) = resolve_redirect(path, request) else { continue };
        if fetcher.head_ok(&candidate).await {
            debug!(url = %candidate.url, "Favicon found at conventional path.");
            return Some(candidate);
        }
    }
    resolve_redirect(FALLBACK_FAVICON, request)
}

/// Fetches the icon with a GET and checks it really is an image.
pub async fn fetch_icon(
    fetcher: &HttpFetcher,
    request: &ScanRequest,
    retries: u32,
    retry_delay: Duration,
) -> Result<Vec<u8>, FetchError> {
    let request = request.clone().with_method(Method::GET);
    let page = fetcher.send_with_retry(&request, retries, retry_delay).await?;
    let url = page.request.url.to_string();
    if !page.status.is_success() {
        return Err(FetchError::Status { url, status: page.status.as_u16() });
    }
    let content_type = page.content_type().unwrap_or_default();
    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(FetchError::ContentType { url, content_type: content_type.to_string() });
    }
    Ok(page.bytes)
}

/// Locates, fetches and hashes the page's favicon. Never fails; problems show
/// up as an empty hash.
pub async fn resolve_favicon(
    fetcher: &HttpFetcher,
    request: &ScanRequest,
    body: &str,
    retries: u32,
    retry_delay: Duration,
) -> Favicon {
    let Some(icon) = locate(fetcher, request, body).await else {
        return Favicon::default();
    };
    let url = icon.logical_url().to_string();
    match fetch_icon(fetcher, &icon, retries, retry_delay).await {
        Ok(bytes) => Favicon { hash: favicon_hash(&bytes), url },
        Err(e) => {
            debug!(url = %url, error = %e, "Favicon unavailable.");
            Favicon { url, hash: String::new() }
        }
    }
}
