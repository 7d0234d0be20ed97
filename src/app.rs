// src/app.rs

use crate::core::cdn::CdnClassifier;
use crate::core::config::ScanConfig;
use crate::core::error::LoadError;
use crate::core::models::{Endpoint, ScanSummary};
use crate::core::resolver::AddressResolver;
use crate::core::scanner::fingerprint_scanner::FingerprintEngine;
use crate::core::scanner::http_fetcher::HttpFetcher;
use crate::core::scanner::{liveness, ResultSink, ScanScheduler};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Anything that stops the pipeline from being assembled.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// The assembled pipeline. Every component is built once here and shared by
/// reference with the stages that need it.
pub struct App {
    config: ScanConfig,
    engine: Arc<FingerprintEngine>,
    scheduler: ScanScheduler,
}

impl App {
    /// Validates `config`, loads rules and CDN data, and wires the components.
    pub fn from_config(config: ScanConfig) -> Result<Self, StartupError> {
        config.validate().map_err(StartupError::Config)?;

        let engine = Arc::new(FingerprintEngine::from_file(&config.finger_file)?);
        let cdn = Arc::new(CdnClassifier::from_files(&config.cdn_cname_file, &config.cdn_ip_file)?);
        Ok(Self::with_components(config, engine, cdn)?)
    }

    /// Wires already-loaded reference data.
    pub fn with_components(
        config: ScanConfig,
        engine: Arc<FingerprintEngine>,
        cdn: Arc<CdnClassifier>,
    ) -> Result<Self, reqwest::Error> {
        let resolver = Arc::new(AddressResolver::from_config(&config));
        let fetcher = HttpFetcher::new(&config)?;
        let scheduler = ScanScheduler::new(&config, resolver, cdn, fetcher, Arc::clone(&engine));
        Ok(Self { config, engine, scheduler })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Liveness probe, then expansion and dispatch. Returns when every task
    /// has reached `sink`.
    pub async fn run(&self, endpoints: Vec<Endpoint>, sink: Arc<dyn ResultSink>) -> ScanSummary {
        let candidates = endpoints.len();
        info!(candidates, rules = self.engine.len(), "Scan starting.");

        let alive = liveness::probe(endpoints, self.config.concurrency, self.config.timeout).await;
        let dispatched = self.scheduler.schedule(&alive, sink).await;

        let summary = ScanSummary {
            candidates,
            alive: alive.len(),
            tasks: dispatched.tasks,
            reported: dispatched.reported,
            failed: dispatched.failed,
        };
        info!(?summary, "Scan finished.");
        summary
    }
}
