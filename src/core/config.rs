// src/core/config.rs

use crate::core::knowledge_base::{
    DEFAULT_CDN_CNAME_FILE, DEFAULT_CDN_IP_FILE, DEFAULT_DNS_CACHE_TTL, DEFAULT_DNS_SERVERS,
    DEFAULT_DNS_SWEEP_INTERVAL, DEFAULT_FINGER_FILE, DEFAULT_OUTPUT_FILE, DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Explicit configuration handed to every stage. There is no global state:
/// components are built once from this value and passed around by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker count for both the liveness pool and the scan pool.
    pub concurrency: usize,
    /// Per-operation timeout (TCP dial, HTTP request, DNS query). HEAD checks use at most 2s.
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Client-redirect hops followed per page.
    pub redirect_hops: u32,
    pub favicon_retries: u32,
    pub dns_servers: Vec<String>,
    pub dns_cache_ttl: Duration,
    pub dns_sweep_interval: Duration,
    /// Whether protocol-level (3xx) redirects are followed by the HTTP client.
    pub follow_http_redirects: bool,
    pub user_agent: String,
    pub output_file: Option<PathBuf>,
    pub json_output: bool,
    pub finger_file: PathBuf,
    pub cdn_cname_file: PathBuf,
    pub cdn_ip_file: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 500,
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            redirect_hops: 3,
            favicon_retries: 3,
            dns_servers: DEFAULT_DNS_SERVERS.iter().map(|s| s.to_string()).collect(),
            dns_cache_ttl: DEFAULT_DNS_CACHE_TTL,
            dns_sweep_interval: DEFAULT_DNS_SWEEP_INTERVAL,
            follow_http_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_file: Some(PathBuf::from(DEFAULT_OUTPUT_FILE)),
            json_output: false,
            finger_file: PathBuf::from(DEFAULT_FINGER_FILE),
            cdn_cname_file: PathBuf::from(DEFAULT_CDN_CNAME_FILE),
            cdn_ip_file: PathBuf::from(DEFAULT_CDN_IP_FILE),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be a positive integer".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
