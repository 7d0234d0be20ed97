// src/core/models.rs

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use url::Url;

// --- Endpoint Models ---

// The two schemes a candidate endpoint can be probed with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Port 80 never pairs with https and port 443 never pairs with http.
    pub fn accepts_port(self, port: u16) -> bool {
        !matches!((self, port), (Scheme::Https, 80) | (Scheme::Http, 443))
    }
}

// One scheme+host+port+path combination to be probed. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub is_domain: bool,
}

impl Endpoint {
    /// Builds an endpoint, deriving `is_domain` from whether `host` is an IP literal.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        let host = host.into();
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        let is_domain = host.parse::<IpAddr>().is_err();
        Self { scheme, host, port, path: path.into(), is_domain }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        authority(&self.host, self.port)
    }

    /// The normalized URL string reported for this endpoint.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.path)
    }

    /// URL for this endpoint with the network target swapped for `addr`.
    pub fn url_for(&self, addr: IpAddr) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}{}", self.scheme, authority(&addr.to_string(), self.port), self.path))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

pub(crate) fn authority(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{v6}]:{port}"),
        _ => format!("{host}:{port}"),
    }
}

// --- Request Models ---

// An owned request descriptor. A fresh `reqwest::RequestBuilder` is built from it
// for every attempt, so it can be retried and re-targeted freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub method: Method,
    pub url: Url,
    /// Explicit `Host` header, set when `url` targets an address on behalf of a domain.
    pub host_header: Option<String>,
}

impl ScanRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, host_header: None }
    }

    pub fn with_host_header(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Same request (method and `Host` header) aimed at another URL.
    pub fn with_url(&self, url: Url) -> Self {
        Self { method: self.method.clone(), url, host_header: self.host_header.clone() }
    }

    /// The host a browser would see: the `Host` header when present, else the URL host.
    pub fn logical_host(&self) -> String {
        match &self.host_header {
            Some(host) => host.clone(),
            None => self.url.host_str().unwrap_or_default().to_string(),
        }
    }

    /// `url` with its host replaced by the logical host.
    pub fn logical_url(&self) -> Url {
        let mut url = self.url.clone();
        if let Some(host) = &self.host_header {
            // set_host only fails for cannot-be-a-base URLs, which never reach here.
            let _ = url.set_host(Some(host));
        }
        url
    }
}

// --- CDN Models ---

// Classification of a logical target. `is_cdn` only ever moves false -> true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnVerdict {
    is_cdn: bool,
    pub cdn_ips: Vec<IpAddr>,
    pub real_ips: Vec<IpAddr>,
}

impl CdnVerdict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cdn(&self) -> bool {
        self.is_cdn
    }

    pub fn mark_cdn(&mut self) {
        self.is_cdn = true;
    }

    pub fn add_cdn_ip(&mut self, ip: IpAddr) {
        self.is_cdn = true;
        self.cdn_ips.push(ip);
    }

    pub fn add_real_ip(&mut self, ip: IpAddr) {
        self.real_ips.push(ip);
    }
}

// A unit of work for the scan pool, consumed exactly once by one worker.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub request: ScanRequest,
    pub endpoint: Endpoint,
    pub cdn: Arc<CdnVerdict>,
}

// --- Fingerprint Models ---

// A rule hit. `matched` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub cms: String,
    pub level: u8,
    pub tags: Vec<String>,
    pub matched: Vec<String>,
}

// --- Report ---

// Everything the result sink receives for one analyzed endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub url: String,
    pub address: String,
    pub status: u16,
    pub title: String,
    pub content_length: usize,
    pub favicon_url: String,
    pub favicon_hash: String,
    pub detections: Vec<DetectionResult>,
    pub cdn: CdnVerdict,
    pub scanned_at: DateTime<Utc>,
}

impl ScanRecord {
    /// `(cms, level)` pairs in detection order.
    pub fn fingers(&self) -> Vec<(&str, u8)> {
        self.detections.iter().map(|d| (d.cms.as_str(), d.level)).collect()
    }
}

// Counters returned by a full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub candidates: usize,
    pub alive: usize,
    pub tasks: usize,
    pub reported: usize,
    pub failed: usize,
}
