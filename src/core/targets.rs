// src/core/targets.rs

//! Target normalization: turns raw addresses, URLs and port specs into the
//! ordered endpoint list the scan pipeline consumes.

use crate::core::error::TargetError;
use crate::core::knowledge_base::{MAX_RANGE_ADDRESSES, MIN_IPV4_PREFIX, MIN_IPV6_PREFIX};
use crate::core::models::{Endpoint, Scheme};
use ipnet::{IpNet, Ipv4AddrRange};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use tracing::{debug, warn};
use url::{Position, Url};

/// Parses a port specification such as `"80,443 8000-8002"`.
///
/// Tokens are separated by commas or spaces; `a-b` is an inclusive range.
/// Any value outside 1-65535 is an error, as is an inverted range.
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, TargetError> {
    let mut ports = Vec::new();
    for token in spec.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(TargetError::InvalidRange(token.to_string()));
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse_port(token)?),
        }
    }
    Ok(ports)
}

fn parse_port(raw: &str) -> Result<u16, TargetError> {
    let raw = raw.trim();
    let value: i64 = raw.parse().map_err(|_| TargetError::InvalidPort(raw.to_string()))?;
    if !(1..=65535).contains(&value) {
        return Err(TargetError::PortOutOfRange(value));
    }
    Ok(value as u16)
}

/// A single raw target after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One or more addresses (literal, CIDR block or dash range).
    Addresses(Vec<IpAddr>),
    /// A URL or bare domain, possibly with scheme, port and path.
    Url(String),
}

/// Classifies one raw target token.
pub fn parse_address(token: &str) -> Result<Target, TargetError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TargetError::InvalidAddress(token.to_string()));
    }
    if let Ok(ip) = token.parse::<IpAddr>() {
        return Ok(Target::Addresses(vec![ip]));
    }
    if !token.contains("://") {
        if let Ok(net) = token.parse::<IpNet>() {
            let min_prefix = match net {
                IpNet::V4(_) => MIN_IPV4_PREFIX,
                IpNet::V6(_) => MIN_IPV6_PREFIX,
            };
            if net.prefix_len() < min_prefix {
                return Err(TargetError::BlockTooLarge(token.to_string()));
            }
            return Ok(Target::Addresses(net.hosts().collect()));
        }
        if let Some(range) = parse_ip_range(token)? {
            return Ok(Target::Addresses(range));
        }
    }
    let probe = if token.contains("://") { token.to_string() } else { format!("http://{token}") };
    match Url::parse(&probe) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(Target::Url(token.to_string())),
        _ => Err(TargetError::InvalidAddress(token.to_string())),
    }
}

/// `10.0.0.1-20` or `10.0.0.1-10.0.0.20`. Returns `Ok(None)` when `token` is not a range.
fn parse_ip_range(token: &str) -> Result<Option<Vec<IpAddr>>, TargetError> {
    let Some((start, end)) = token.split_once('-') else {
        return Ok(None);
    };
    let Ok(start) = start.trim().parse::<Ipv4Addr>() else {
        return Ok(None);
    };
    let end = match end.trim().parse::<Ipv4Addr>() {
        Ok(end) => end,
        Err(_) => {
            let last: u8 = end
                .trim()
                .parse()
                .map_err(|_| TargetError::InvalidAddress(token.to_string()))?;
            let [a, b, c, _] = start.octets();
            Ipv4Addr::new(a, b, c, last)
        }
    };
    if start > end {
        return Err(TargetError::InvalidAddress(token.to_string()));
    }
    if u32::from(end) - u32::from(start) >= MAX_RANGE_ADDRESSES {
        return Err(TargetError::BlockTooLarge(token.to_string()));
    }
    Ok(Some(Ipv4AddrRange::new(start, end).map(IpAddr::V4).collect()))
}

/// Address × port expansion: 80 is http only, 443 is https only, anything else gets both.
pub fn expand_addresses(addresses: &[IpAddr], ports: &[u16]) -> Vec<Endpoint> {
    let mut endpoints = Vec::with_capacity(addresses.len() * ports.len() * 2);
    for addr in addresses {
        let host = addr.to_string();
        for &port in ports {
            let schemes: &[Scheme] = match port {
                80 => &[Scheme::Http],
                443 => &[Scheme::Https],
                _ => &[Scheme::Http, Scheme::Https],
            };
            for &scheme in schemes {
                endpoints.push(Endpoint::new(scheme, host.clone(), port, ""));
            }
        }
    }
    endpoints
}

/// Expands a URL or bare domain into endpoints.
///
/// Without a scheme both http and https are generated. Without an explicit
/// port, a bare host fans out over `ports` while a host with a path uses the
/// scheme's default port. Invalid scheme/port pairs are dropped.
pub fn expand_url(raw: &str, ports: &[u16]) -> Result<Vec<Endpoint>, TargetError> {
    let raw = raw.trim();
    let candidates: Vec<String> = if raw.contains("://") {
        vec![raw.to_string()]
    } else {
        vec![format!("http://{raw}"), format!("https://{raw}")]
    };

    let mut endpoints = Vec::new();
    for candidate in candidates {
        let url = Url::parse(&candidate).map_err(|_| TargetError::InvalidAddress(raw.to_string()))?;
        let scheme: Scheme = url
            .scheme()
            .parse()
            .map_err(|_| TargetError::InvalidAddress(raw.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::InvalidAddress(raw.to_string()))?;

        let (authority, rest) = split_authority(&candidate);
        let path = if rest.is_empty() { "" } else { &url[Position::BeforePath..Position::AfterQuery] };

        if has_explicit_port(authority) {
            let port = url.port_or_known_default().unwrap_or(scheme.default_port());
            if scheme.accepts_port(port) {
                endpoints.push(Endpoint::new(scheme, host, port, path));
            }
        } else if path.is_empty() {
            for &port in ports.iter().filter(|&&p| scheme.accepts_port(p)) {
                endpoints.push(Endpoint::new(scheme, host, port, path));
            }
        } else {
            endpoints.push(Endpoint::new(scheme, host, scheme.default_port(), path));
        }
    }
    Ok(endpoints)
}

/// Splits `scheme://authority/rest` into `(authority, rest)`.
fn split_authority(url: &str) -> (&str, &str) {
    let after_scheme = url.split_once("://").map_or(url, |(_, r)| r);
    let end = after_scheme.find(['/', '?', '#']).unwrap_or(after_scheme.len());
    after_scheme.split_at(end)
}

fn has_explicit_port(authority: &str) -> bool {
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    match host_port.rfind(']') {
        Some(idx) => host_port[idx..].contains(':'),
        None => host_port.contains(':'),
    }
}

/// Normalizes raw target tokens into a de-duplicated endpoint list.
///
/// Bad tokens are reported back alongside the endpoints and otherwise skipped.
pub fn normalize<'a>(tokens: impl IntoIterator<Item = &'a str>, ports: &[u16]) -> (Vec<Endpoint>, Vec<TargetError>) {
    let mut endpoints = Vec::new();
    let mut errors = Vec::new();

    for token in tokens.into_iter().flat_map(|t| t.split(',')) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let expanded = match parse_address(token) {
            Ok(Target::Addresses(addrs)) => Ok(expand_addresses(&addrs, ports)),
            Ok(Target::Url(raw)) => expand_url(&raw, ports),
            Err(e) => Err(e),
        };
        match expanded {
            Ok(list) => {
                debug!(target = token, endpoints = list.len(), "Target expanded.");
                endpoints.extend(list);
            }
            Err(e) => {
                warn!(target = token, error = %e, "Skipping unparseable target.");
                errors.push(e);
            }
        }
    }

    let mut seen = HashSet::new();
    endpoints.retain(|ep| seen.insert(ep.clone()));
    (endpoints, errors)
}

/// Reads a target file: one target per line, blank lines and `#` comments skipped.
pub fn read_target_file(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}
