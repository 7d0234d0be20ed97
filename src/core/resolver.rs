// src/core/resolver.rs

use crate::core::config::ScanConfig;
use crate::core::error::ResolveError;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RData;
use hickory_resolver::TokioAsyncResolver;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Addresses (and any CNAME chain seen on the way) for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub addrs: Vec<IpAddr>,
    pub cnames: Vec<String>,
}

struct CacheEntry {
    resolution: Resolution,
    inserted_at: Instant,
}

/// Time-bounded, thread-safe domain cache.
///
/// Entries older than `ttl` read as misses. Stale entries are purged on insert
/// once `sweep_interval` has passed since the previous sweep.
pub struct DnsCache {
    ttl: Duration,
    sweep_interval: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    last_sweep: Mutex<Instant>,
}

impl DnsCache {
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            entries: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn get(&self, domain: &str) -> Option<Resolution> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(domain)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.resolution.clone())
    }

    pub fn insert(&self, domain: &str, resolution: Resolution) {
        self.maybe_sweep();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            domain.to_string(),
            CacheEntry { resolution, inserted_at: Instant::now() },
        );
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maybe_sweep(&self) {
        let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
        if last.elapsed() >= self.sweep_interval {
            *last = Instant::now();
            drop(last);
            let purged = self.purge_expired();
            debug!(purged, "DNS cache sweep.");
        }
    }
}

struct Upstream {
    label: String,
    resolver: TokioAsyncResolver,
}

/// Domain-to-address resolution: cache, then a random configured server, then
/// the platform resolver.
///
/// Concurrent misses for the same domain may each query upstream; whichever
/// succeeds populates the cache for everyone after it.
pub struct AddressResolver {
    upstreams: Vec<Upstream>,
    cache: DnsCache,
    timeout: Duration,
}

impl AddressResolver {
    /// Builds one upstream resolver per server. Entries may be `ip` or `ip:port`;
    /// anything else is skipped with a warning. An empty list means platform-only.
    pub fn new(servers: &[String], timeout: Duration, cache: DnsCache) -> Self {
        let upstreams = servers
            .iter()
            .filter_map(|server| {
                let socket = match server.parse::<SocketAddr>() {
                    Ok(sa) => sa,
                    Err(_) => match server.parse::<IpAddr>() {
                        Ok(ip) => SocketAddr::new(ip, 53),
                        Err(_) => {
                            warn!(server = %server, "Ignoring unparseable DNS server.");
                            return None;
                        }
                    },
                };
                Some(Upstream { label: socket.to_string(), resolver: upstream_resolver(socket, timeout) })
            })
            .collect();
        Self { upstreams, cache, timeout }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            &config.dns_servers,
            config.timeout,
            DnsCache::new(config.dns_cache_ttl, config.dns_sweep_interval),
        )
    }

    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    /// Resolves `domain`, consulting the cache first.
    pub async fn resolve(&self, domain: &str) -> Result<Resolution, ResolveError> {
        if let Some(hit) = self.cache.get(domain) {
            debug!(domain, "DNS cache hit.");
            return Ok(hit);
        }

        let mut reasons = Vec::new();

        if let Some(upstream) = self.pick_upstream() {
            match self.query_upstream(upstream, domain).await {
                Ok(resolution) => {
                    self.cache.insert(domain, resolution.clone());
                    return Ok(resolution);
                }
                Err(e) => {
                    debug!(domain, server = %upstream.label, error = %e, "Custom DNS lookup failed.");
                    reasons.push(format!("{}: {e}", upstream.label));
                }
            }
        }

        match self.query_system(domain).await {
            Ok(resolution) => {
                self.cache.insert(domain, resolution.clone());
                Ok(resolution)
            }
            Err(e) => {
                reasons.push(format!("system: {e}"));
                Err(ResolveError { domain: domain.to_string(), reason: reasons.join("; ") })
            }
        }
    }

    /// Uniform choice over the configured servers.
    fn pick_upstream(&self) -> Option<&Upstream> {
        self.upstreams.choose(&mut rand::thread_rng())
    }

    async fn query_upstream(&self, upstream: &Upstream, domain: &str) -> Result<Resolution, String> {
        let lookup = upstream.resolver.lookup_ip(domain).await.map_err(|e| e.to_string())?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err("no A/AAAA records in answer".to_string());
        }
        let cnames = lookup
            .as_lookup()
            .records()
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::CNAME(cname)) => Some(cname.to_string().trim_end_matches('.').to_string()),
                _ => None,
            })
            .collect();
        Ok(Resolution { addrs, cnames })
    }

    async fn query_system(&self, domain: &str) -> Result<Resolution, String> {
        let lookup = tokio::time::timeout(self.timeout, tokio::net::lookup_host((domain, 0)))
            .await
            .map_err(|_| "timed out".to_string())?
            .map_err(|e| e.to_string())?;
        let mut addrs: Vec<IpAddr> = Vec::new();
        for sa in lookup {
            if !addrs.contains(&sa.ip()) {
                addrs.push(sa.ip());
            }
        }
        if addrs.is_empty() {
            return Err("no addresses".to_string());
        }
        Ok(Resolution { addrs, cnames: Vec::new() })
    }
}

fn upstream_resolver(server: SocketAddr, timeout: Duration) -> TokioAsyncResolver {
    let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.cache_size = 0;
    TokioAsyncResolver::tokio(config, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn resolution(ip: &str) -> Resolution {
        Resolution { addrs: vec![ip.parse().unwrap()], cnames: vec![] }
    }

    #[test]
    fn cache_hit_and_expiry() {
        let cache = DnsCache::new(Duration::from_millis(50), Duration::from_secs(600));
        cache.insert("example.com", resolution("93.184.216.34"));
        assert_eq!(cache.get("example.com"), Some(resolution("93.184.216.34")));
        assert_eq!(cache.get("other.com"), None);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("example.com"), None);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_runs_on_insert_after_interval() {
        let cache = DnsCache::new(Duration::from_millis(10), Duration::from_millis(20));
        cache.insert("a.com", resolution("1.1.1.1"));
        std::thread::sleep(Duration::from_millis(40));
        cache.insert("b.com", resolution("2.2.2.2"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn server_choice_is_not_biased_to_first() {
        let servers: Vec<String> = vec!["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3:5353".into(), "bogus".into()];
        let resolver = AddressResolver::new(
            &servers,
            Duration::from_millis(200),
            DnsCache::new(Duration::from_secs(60), Duration::from_secs(60)),
        );
        assert_eq!(resolver.upstreams.len(), 3);
        let picked: HashSet<String> = (0..300)
            .filter_map(|_| resolver.pick_upstream().map(|u| u.label.clone()))
            .collect();
        assert_eq!(picked.len(), 3);
    }

    #[tokio::test]
    async fn cached_answer_short_circuits_lookup() {
        let resolver = AddressResolver::new(
            &[],
            Duration::from_millis(200),
            DnsCache::new(Duration::from_secs(60), Duration::from_secs(60)),
        );
        resolver.cache().insert("cached.invalid", resolution("10.9.8.7"));
        let hit = resolver.resolve("cached.invalid").await.unwrap();
        assert_eq!(hit.addrs, vec!["10.9.8.7".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn platform_fallback_resolves_localhost() {
        let resolver = AddressResolver::new(
            &[],
            Duration::from_secs(2),
            DnsCache::new(Duration::from_secs(60), Duration::from_secs(60)),
        );
        let first = resolver.resolve("localhost").await.unwrap();
        assert!(first.addrs.iter().all(|ip| ip.is_loopback()));
        assert_eq!(resolver.cache().get("localhost"), Some(first));
    }

    #[tokio::test]
    async fn unresolvable_domain_errors() {
        let resolver = AddressResolver::new(
            &[],
            Duration::from_secs(2),
            DnsCache::new(Duration::from_secs(60), Duration::from_secs(60)),
        );
        let err = resolver.resolve("no-such-host.invalid").await.unwrap_err();
        assert_eq!(err.domain, "no-such-host.invalid");
    }
}
