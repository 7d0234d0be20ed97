// src/core/error.rs

//! Error types for every stage of the pipeline.
//!
//! Only [`LoadError`] is fatal: it is raised while loading reference data,
//! before any scanning begins. Everything else is per-entry or per-task and
//! never aborts a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Failure loading fingerprint rules or CDN reference data.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rule file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}:{line}: invalid CIDR block `{value}`")]
    InvalidCidr { path: PathBuf, line: usize, value: String },
    #[error("rule `{cms}`: {reason}")]
    InvalidRule { cms: String, reason: String },
}

/// Failure normalizing a target or port specification.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid port `{0}`")]
    InvalidPort(String),
    #[error("port {0} out of range 1-65535")]
    PortOutOfRange(i64),
    #[error("invalid port range `{0}`")]
    InvalidRange(String),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("address block `{0}` is too large to expand")]
    BlockTooLarge(String),
}

/// Every resolution strategy failed for a domain.
#[derive(Error, Debug)]
#[error("DNS resolution failed for {domain}: {reason}")]
pub struct ResolveError {
    pub domain: String,
    pub reason: String,
}

/// Failure fetching a page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("unexpected content type `{content_type}` from {url}")]
    ContentType { url: String, content_type: String },
}

/// Why a scan task produced no record.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("task panicked: {0}")]
    Panicked(String),
}
