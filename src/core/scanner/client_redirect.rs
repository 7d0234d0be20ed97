// src/core/scanner/client_redirect.rs

//! Detection and resolution of same-document redirects: HTML meta refresh and
//! script `location` changes. Detection is regex based and deliberately
//! heuristic; one hop is resolved per call.

use crate::core::knowledge_base::SCRIPT_REDIRECT_WINDOW;
use crate::core::models::ScanRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use tracing::debug;
use url::Url;

static RE_META_REFRESH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]*?http-equiv=[^>]*?refresh[^>]*?url=\s*['"]?([^"'>\s]*)"#).unwrap());
static RE_LOCATION_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:window\.|document\.|top\.|self\.)?location(?:\.href)?\s*=\s*["']([^"']*)["']"#).unwrap()
});
static RE_LOCATION_REPLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)location\.replace\(\s*["']([^"']*)["']\s*\)"#).unwrap());
// A meta tag directly behind an opening comment (or an IE conditional comment) is inert.
static RE_COMMENT_GUARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!--\s*(?:\[if[^\]]*\]>)?\s*$").unwrap());

/// Finds the first client-redirect target in `body`, checking meta refresh,
/// then script location assignment, then `location.replace`. Script patterns
/// only look at the first few hundred bytes of the body.
pub fn find_redirect(body: &str) -> Option<String> {
    if let Some(caps) = RE_META_REFRESH.captures(body) {
        let (whole, target) = (caps.get(0)?, caps.get(1)?);
        let guarded = RE_COMMENT_GUARD.is_match(&body[..whole.start()]);
        if !guarded && !target.as_str().contains("nojavascript.html") {
            return Some(target.as_str().to_string());
        }
        debug!(tag = whole.as_str(), "Ignoring guarded meta refresh.");
    }

    let head = leading(body, SCRIPT_REDIRECT_WINDOW);
    [&RE_LOCATION_ASSIGN, &RE_LOCATION_REPLACE]
        .iter()
        .find_map(|re| re.captures(head).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
}

/// Turns a raw redirect target into the follow-up request.
///
/// Relative targets resolve against the page as the browser saw it (the
/// logical host). Targets on the logical host keep the request's network
/// address and `Host` header. Absolute targets on a private or loopback
/// address are pulled back onto the logical host and the current port. Any
/// other absolute target gets a plain request.
pub fn resolve_redirect(raw: &str, request: &ScanRequest) -> Option<ScanRequest> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '"' && *c != '\'').collect();
    let cleaned = cleaned.trim();
    let lowered = cleaned.to_ascii_lowercase();
    if cleaned.is_empty()
        || cleaned.starts_with('#')
        || lowered == "http:"
        || lowered == "https:"
        || lowered.starts_with("javascript:")
    {
        return None;
    }

    let logical_host = request.logical_host();
    let is_absolute = lowered.starts_with("http://") || lowered.starts_with("https://");

    let mut target = if is_absolute {
        Url::parse(cleaned).ok()?
    } else {
        request.logical_url().join(cleaned).ok()?
    };

    if is_absolute && target.host_str().and_then(parse_host_ip).is_some_and(is_local) {
        debug!(from = %target, host = %logical_host, "Rewriting private redirect onto target host.");
        target.set_host(Some(&logical_host)).ok()?;
        target.set_port(request.url.port()).ok()?;
    }

    let same_host = target.host_str().is_some_and(|h| h.eq_ignore_ascii_case(&logical_host));
    if !same_host {
        return Some(ScanRequest { method: request.method.clone(), url: target, host_header: None });
    }
    if request.host_header.is_some() {
        target.set_host(request.url.host_str()).ok()?;
    }
    Some(request.with_url(target))
}

fn parse_host_ip(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[').trim_end_matches(']').parse().ok()
}

/// Loopback, RFC 1918 and link-local addresses.
pub fn is_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

fn leading(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
