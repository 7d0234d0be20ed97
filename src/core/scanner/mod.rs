// src/core/scanner/mod.rs

// Public interface of the `scanner` module: the per-stage modules plus the
// scheduler that expands endpoints into tasks and drives them through
// fetch -> analyze -> detect -> report on a worker pool.
pub mod client_redirect;
pub mod favicon;
pub mod fingerprint_scanner;
pub mod http_fetcher;
pub mod liveness;
pub mod response_analyzer;

use crate::core::cdn::CdnClassifier;
use crate::core::config::ScanConfig;
use crate::core::error::ScanError;
use crate::core::knowledge_base::{MAX_QUEUE_CAPACITY, QUEUE_SLACK};
use crate::core::models::{CdnVerdict, Endpoint, ScanRecord, ScanRequest, ScanTask};
use crate::core::pool::{panic_message, run_pool};
use crate::core::resolver::AddressResolver;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use self::fingerprint_scanner::FingerprintEngine;
use self::http_fetcher::HttpFetcher;
use self::response_analyzer::ResponseAnalyzer;

/// Receives the outcome of every scan task. Called concurrently from workers.
pub trait ResultSink: Send + Sync {
    fn report(&self, record: &ScanRecord);

    /// A task produced no record. Ignored unless overridden.
    fn failed(&self, _url: &str, _error: &ScanError) {}
}

/// Task counters for one `schedule` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub tasks: usize,
    pub reported: usize,
    pub failed: usize,
}

// Everything a worker needs, shared by reference count across the pool.
struct Worker {
    fetcher: HttpFetcher,
    analyzer: ResponseAnalyzer,
    sink: Arc<dyn ResultSink>,
    max_retries: u32,
    retry_delay: Duration,
    redirect_hops: u32,
}

impl Worker {
    async fn process(&self, task: &ScanTask) -> Result<ScanRecord, ScanError> {
        let page = self
            .fetcher
            .fetch(&task.request, self.max_retries, self.retry_delay, self.redirect_hops)
            .await?;
        let analysis = self.analyzer.analyze(&page, &task.endpoint.path).await;

        Ok(ScanRecord {
            url: task.endpoint.url(),
            address: task.request.url.host_str().unwrap_or_default().to_string(),
            status: page.status.as_u16(),
            title: analysis.title,
            content_length: analysis.content_length,
            favicon_url: analysis.favicon_url,
            favicon_hash: analysis.favicon_hash,
            detections: analysis.detections,
            cdn: task.cdn.as_ref().clone(),
            scanned_at: Utc::now(),
        })
    }

    /// Runs one task to completion and hands the outcome to the sink. A panic
    /// inside the task is caught here and reported as a failure for its URL.
    async fn run(&self, task: ScanTask) -> bool {
        let url = task.endpoint.url();
        let outcome = AssertUnwindSafe(self.process(&task)).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(record)) => {
                self.sink.report(&record);
                return true;
            }
            Ok(Err(e)) => {
                debug!(url = %url, address = %task.request.url, error = %e, "Task abandoned.");
                e
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!(url = %url, panic = %message, "Task panicked.");
                ScanError::Panicked(message)
            }
        };
        self.sink.failed(&url, &error);
        false
    }
}

/// Expands alive endpoints into per-address tasks and dispatches them.
pub struct ScanScheduler {
    resolver: Arc<AddressResolver>,
    cdn: Arc<CdnClassifier>,
    fetcher: HttpFetcher,
    analyzer: ResponseAnalyzer,
    concurrency: usize,
    max_retries: u32,
    retry_delay: Duration,
    redirect_hops: u32,
}

impl ScanScheduler {
    pub fn new(
        config: &ScanConfig,
        resolver: Arc<AddressResolver>,
        cdn: Arc<CdnClassifier>,
        fetcher: HttpFetcher,
        engine: Arc<FingerprintEngine>,
    ) -> Self {
        let analyzer = ResponseAnalyzer::new(fetcher.clone(), engine, config.favicon_retries, config.retry_delay);
        Self {
            resolver,
            cdn,
            fetcher,
            analyzer,
            concurrency: config.concurrency.max(1),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            redirect_hops: config.redirect_hops,
        }
    }

    /// Expands then dispatches. Returns once every task has reported.
    pub async fn schedule(&self, endpoints: &[Endpoint], sink: Arc<dyn ResultSink>) -> DispatchReport {
        let tasks = self.expand(endpoints).await;
        self.dispatch(tasks, sink).await
    }

    /// Builds the task list, in endpoint order. Domains are resolved
    /// concurrently; a domain that fails to resolve contributes no tasks.
    pub async fn expand(&self, endpoints: &[Endpoint]) -> Vec<ScanTask> {
        let batches: Vec<Vec<ScanTask>> = stream::iter(endpoints)
            .map(|endpoint| self.expand_endpoint(endpoint))
            .buffered(self.concurrency)
            .collect()
            .await;
        let tasks: Vec<ScanTask> = batches.into_iter().flatten().collect();
        info!(endpoints = endpoints.len(), tasks = tasks.len(), "Scan tasks generated.");
        tasks
    }

    async fn expand_endpoint(&self, endpoint: &Endpoint) -> Vec<ScanTask> {
        if !endpoint.is_domain {
            return match Url::parse(&endpoint.url()) {
                Ok(url) => vec![ScanTask {
                    request: ScanRequest::get(url),
                    endpoint: endpoint.clone(),
                    cdn: Arc::new(CdnVerdict::new()),
                }],
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "Cannot build request URL.");
                    Vec::new()
                }
            };
        }

        let mut verdict = CdnVerdict::new();
        if self.cdn.is_cdn_cname(&endpoint.host) {
            info!(host = %endpoint.host, "Host name matches a CDN CNAME keyword.");
            verdict.mark_cdn();
        }

        let resolution = match self.resolver.resolve(&endpoint.host).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(host = %endpoint.host, error = %e, "Skipping unresolvable domain.");
                return Vec::new();
            }
        };

        if let Some(cname) = resolution.cnames.iter().find(|c| self.cdn.is_cdn_cname(c)) {
            info!(host = %endpoint.host, cname = %cname, "CNAME chain points at a CDN.");
            verdict.mark_cdn();
        }
        for ip in &resolution.addrs {
            if self.cdn.is_cdn_ip(*ip) {
                info!(host = %endpoint.host, ip = %ip, "Address inside a CDN range.");
                verdict.add_cdn_ip(*ip);
            } else {
                verdict.add_real_ip(*ip);
            }
        }
        let verdict = Arc::new(verdict);

        resolution
            .addrs
            .iter()
            .filter_map(|ip| match endpoint.url_for(*ip) {
                Ok(url) => Some(ScanTask {
                    request: ScanRequest::get(url).with_host_header(endpoint.host.clone()),
                    endpoint: endpoint.clone(),
                    cdn: Arc::clone(&verdict),
                }),
                Err(e) => {
                    debug!(endpoint = %endpoint, ip = %ip, error = %e, "Cannot build request URL.");
                    None
                }
            })
            .collect()
    }

    /// Runs every task on a pool of `concurrency` workers. Each task reaches
    /// the sink exactly once, as a record or as a failure.
    pub async fn dispatch(&self, tasks: Vec<ScanTask>, sink: Arc<dyn ResultSink>) -> DispatchReport {
        let total = tasks.len();
        if total == 0 {
            info!("No scan tasks to dispatch.");
            return DispatchReport::default();
        }

        let capacity = queue_capacity(total, self.concurrency);
        let worker = Arc::new(Worker {
            fetcher: self.fetcher.clone(),
            analyzer: self.analyzer.clone(),
            sink: Arc::clone(&sink),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            redirect_hops: self.redirect_hops,
        });
        info!(tasks = total, workers = self.concurrency, capacity, "Dispatching scan tasks.");

        let outcomes = run_pool(tasks, self.concurrency, capacity, move |task: ScanTask| {
            let worker = Arc::clone(&worker);
            async move { worker.run(task).await }
        })
        .await;

        let mut report = DispatchReport { tasks: total, ..Default::default() };
        for outcome in outcomes {
            match outcome {
                Ok(true) => report.reported += 1,
                Ok(false) => report.failed += 1,
                // The sink itself panicked; the task has already been accounted to it.
                Err(message) => {
                    warn!(panic = %message, "Result sink panicked.");
                    report.failed += 1;
                }
            }
        }
        info!(reported = report.reported, failed = report.failed, "Scan dispatch finished.");
        report
    }
}

/// Task count times the slack factor, never below the worker count, capped.
pub fn queue_capacity(tasks: usize, workers: usize) -> usize {
    tasks
        .saturating_mul(QUEUE_SLACK)
        .max(workers)
        .min(MAX_QUEUE_CAPACITY)
        .max(1)
}
