// src/core/cdn.rs

use crate::core::error::LoadError;
use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

/// Decides whether a name or address is fronted by a CDN.
///
/// Built once from a CNAME keyword list and a CIDR list, then only read, so it
/// can be shared across workers behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct CdnClassifier {
    cname_keywords: Vec<String>,
    cdn_nets: Vec<IpNet>,
}

impl CdnClassifier {
    pub fn new(cname_keywords: Vec<String>, cdn_nets: Vec<IpNet>) -> Self {
        let cname_keywords = cname_keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { cname_keywords, cdn_nets }
    }

    /// Loads both reference files. Either one failing is fatal for startup.
    pub fn from_files(cname_file: &Path, ip_file: &Path) -> Result<Self, LoadError> {
        let keywords = read_lines(cname_file)?.into_iter().map(|(_, line)| line).collect();
        let nets = read_lines(ip_file)?
            .into_iter()
            .map(|(line, value)| {
                parse_net(&value).ok_or_else(|| LoadError::InvalidCidr {
                    path: ip_file.to_path_buf(),
                    line,
                    value,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let classifier = Self::new(keywords, nets);
        info!(
            keywords = classifier.cname_keywords.len(),
            cidrs = classifier.cdn_nets.len(),
            "CDN reference data loaded."
        );
        Ok(classifier)
    }

    /// Case-insensitive substring match against every CNAME keyword.
    pub fn is_cdn_cname(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.cname_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    /// True when `ip` falls inside any loaded CIDR block.
    pub fn is_cdn_ip(&self, ip: IpAddr) -> bool {
        self.cdn_nets.iter().any(|net| net.contains(&ip))
    }
}

/// Non-empty, non-comment lines with their 1-based line numbers.
fn read_lines(path: &Path) -> Result<Vec<(usize, String)>, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(idx, line)| (idx, line.to_string()))
        .collect())
}

fn parse_net(value: &str) -> Option<IpNet> {
    value
        .parse::<IpNet>()
        .ok()
        .or_else(|| {
            let ip = value.parse::<IpAddr>().ok()?;
            IpNet::new(ip, if ip.is_ipv4() { 32 } else { 128 }).ok()
        })
}
