// src/core/scanner/http_fetcher.rs

use crate::core::config::ScanConfig;
use crate::core::error::FetchError;
use crate::core::knowledge_base::MAX_HEAD_TIMEOUT;
use crate::core::models::ScanRequest;
use crate::core::scanner::client_redirect::{find_redirect, resolve_redirect};
use reqwest::header::{HeaderMap, CONTENT_TYPE, HOST};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// A fully buffered response. The body can be read any number of times.
#[derive(Debug, Clone)]
pub struct Page {
    /// The request that produced this page, re-targeted to the final URL when
    /// the client followed protocol redirects.
    pub request: ScanRequest,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
    /// `bytes` decoded as UTF-8, invalid sequences replaced.
    pub body: String,
}

impl Page {
    async fn read(request: &ScanRequest, response: Response) -> Result<Self, FetchError> {
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Body { url: request.url.to_string(), source })?
            .to_vec();
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let request = if final_url == request.url {
            request.clone()
        } else if final_url.host_str() == request.url.host_str() {
            request.with_url(final_url)
        } else {
            ScanRequest { method: request.method.clone(), url: final_url, host_header: None }
        };
        Ok(Self { request, status, headers, bytes, body })
    }

    /// First value of `name` as text, if present and valid UTF-8.
    pub fn header_str(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_str(CONTENT_TYPE)
    }
}

/// Shared HTTP client with bounded retry and client-redirect following.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    head_timeout: Duration,
}

impl HttpFetcher {
    /// Builds the client once: per-request and connect timeouts, invalid
    /// certificates accepted, protocol redirects per `follow_http_redirects`.
    pub fn new(config: &ScanConfig) -> Result<Self, reqwest::Error> {
        let redirect = if config.follow_http_redirects { Policy::limited(10) } else { Policy::none() };
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(1000)
            .redirect(redirect)
            .build()?;
        Ok(Self { client, head_timeout: config.timeout.min(MAX_HEAD_TIMEOUT) })
    }

    fn build(&self, request: &ScanRequest) -> RequestBuilder {
        let builder = self.client.request(request.method.clone(), request.url.clone());
        match &request.host_header {
            Some(host) => builder.header(HOST, host.as_str()),
            None => builder,
        }
    }

    /// Fetches `request`, retrying transient failures, then follows up to
    /// `redirect_hops` client redirects found in the body.
    ///
    /// # Arguments
    /// * `max_retries` - Extra attempts after the first for timeouts and 5xx.
    /// * `retry_delay` - Pause between attempts.
    /// * `redirect_hops` - Meta refresh / script redirects to follow; `0` disables them.
    ///
    /// # Returns
    /// The last page fetched. A hop that fails to fetch fails the whole call.
    pub async fn fetch(
        &self,
        request: &ScanRequest,
        max_retries: u32,
        retry_delay: Duration,
        redirect_hops: u32,
    ) -> Result<Page, FetchError> {
        let mut page = self.send_with_retry(request, max_retries, retry_delay).await?;

        for hop in 1..=redirect_hops {
            let Some(raw) = find_redirect(&page.body) else { break };
            let Some(next) = resolve_redirect(&raw, &page.request) else { break };
            if next == page.request {
                break;
            }
            debug!(hop, from = %page.request.url, to = %next.url, "Following client redirect.");
            page = self.send_with_retry(&next, 0, retry_delay).await?;
        }
        Ok(page)
    }

    /// Up to `max_retries + 1` attempts. The first non-retryable outcome is
    /// buffered and returned; after the last attempt, whatever came back is
    /// returned (a 5xx page or the transport error).
    pub async fn send_with_retry(
        &self,
        request: &ScanRequest,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Page, FetchError> {
        let attempts = max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last = attempt >= attempts;
            match self.build(request).send().await {
                Ok(response) if response.status().is_server_error() && !last => {
                    debug!(url = %request.url, status = %response.status(), attempt, "Server error, retrying.");
                }
                Ok(response) => return Page::read(request, response).await,
                Err(e) if is_transient(&e) && !last => {
                    debug!(url = %request.url, error = %e, attempt, "Transient failure, retrying.");
                }
                Err(source) => return Err(FetchError::Transport { url: request.url.to_string(), source }),
            }
            tokio::time::sleep(retry_delay).await;
        }
    }

    /// HEAD existence check: true only for a 2xx answer within the HEAD timeout.
    pub async fn head_ok(&self, request: &ScanRequest) -> bool {
        let head = request.clone().with_method(Method::HEAD);
        match self.build(&head).timeout(self.head_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %head.url, error = %e, "HEAD check failed.");
                false
            }
        }
    }
}

/// Timeouts (connect timeouts included) are worth another attempt; a refused
/// or reset connection is not.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout()
}
