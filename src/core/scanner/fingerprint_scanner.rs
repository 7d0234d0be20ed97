// src/core/scanner/fingerprint_scanner.rs

use crate::core::error::LoadError;
use crate::core::models::DetectionResult;
use crate::core::rules::{load_rules, Condition, FingerprintRule, Keyword, Location, Logic};
use once_cell::unsync::OnceCell;
use reqwest::header::HeaderMap;
use std::path::Path;
use tracing::debug;

/// Joins every header as `Name: v1,v2`, one per line. Order follows the map.
pub fn header_blob(headers: &HeaderMap) -> String {
    headers
        .keys()
        .map(|name| {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            format!("{}: {}", name.as_str(), values.join(","))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The data a rule can look at for one response. The header blob and the
/// lower-cased copies used by substring matching are built on first use.
pub struct Evidence<'a> {
    headers: &'a HeaderMap,
    body: &'a str,
    title: &'a str,
    favicon_hash: &'a str,
    path: &'a str,
    header_blob: OnceCell<String>,
    lowered: [OnceCell<String>; 5],
}

impl<'a> Evidence<'a> {
    pub fn new(headers: &'a HeaderMap, body: &'a str, title: &'a str, favicon_hash: &'a str, path: &'a str) -> Self {
        Self {
            headers,
            body,
            title,
            favicon_hash,
            path,
            header_blob: OnceCell::new(),
            lowered: Default::default(),
        }
    }

    fn text(&self, location: Location) -> &str {
        match location {
            Location::Header => self.header_blob.get_or_init(|| header_blob(self.headers)),
            Location::Body => self.body,
            Location::Title => self.title,
            Location::Favicon => self.favicon_hash,
            Location::Path => self.path,
        }
    }

    fn lowered(&self, location: Location) -> &str {
        self.lowered[location as usize].get_or_init(|| self.text(location).to_lowercase())
    }
}

enum ConditionOutcome {
    Satisfied(Vec<String>),
    Unsatisfied,
    /// The condition has no keywords; the whole rule is abandoned.
    Empty,
}

/// Evaluates loaded fingerprint rules against analyzed responses.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct FingerprintEngine {
    rules: Vec<FingerprintRule>,
}

impl FingerprintEngine {
    pub fn new(rules: Vec<FingerprintRule>) -> Self {
        Self { rules }
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        Ok(Self::new(load_rules(path)?))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule independently and returns the ones whose logic holds.
    pub fn detect(
        &self,
        headers: &HeaderMap,
        body: &str,
        title: &str,
        favicon_hash: &str,
        path: &str,
    ) -> Vec<DetectionResult> {
        let evidence = Evidence::new(headers, body, title, favicon_hash, path);
        self.detect_evidence(&evidence)
    }

    pub fn detect_evidence(&self, evidence: &Evidence<'_>) -> Vec<DetectionResult> {
        let results: Vec<DetectionResult> =
            self.rules.iter().filter_map(|rule| evaluate_rule(rule, evidence)).collect();
        debug!(rules = self.rules.len(), hits = results.len(), "Fingerprint rules applied.");
        results
    }
}

/// `And` stops at the first unsatisfied condition; `Or` stops at the first
/// satisfied one and keeps only its keywords. A result always carries at least
/// one matched keyword.
fn evaluate_rule(rule: &FingerprintRule, evidence: &Evidence<'_>) -> Option<DetectionResult> {
    let mut matched = Vec::new();

    let satisfied = match rule.logic {
        Logic::And => {
            let mut all = true;
            for condition in &rule.conditions {
                match evaluate_condition(condition, evidence) {
                    ConditionOutcome::Satisfied(keywords) => matched.extend(keywords),
                    ConditionOutcome::Unsatisfied => {
                        all = false;
                        break;
                    }
                    ConditionOutcome::Empty => return None,
                }
            }
            all
        }
        Logic::Or => {
            let mut any = false;
            for condition in &rule.conditions {
                match evaluate_condition(condition, evidence) {
                    ConditionOutcome::Satisfied(keywords) => {
                        matched.extend(keywords);
                        any = true;
                        break;
                    }
                    ConditionOutcome::Unsatisfied => continue,
                    ConditionOutcome::Empty => return None,
                }
            }
            any
        }
    };

    if !satisfied || matched.is_empty() {
        return None;
    }
    debug!(cms = %rule.cms, matched = ?matched, "Rule matched.");
    Some(DetectionResult {
        cms: rule.cms.clone(),
        level: rule.level,
        tags: rule.tags.clone(),
        matched,
    })
}

/// Every keyword must hit for the condition to hold.
fn evaluate_condition(condition: &Condition, evidence: &Evidence<'_>) -> ConditionOutcome {
    if condition.keywords.is_empty() {
        return ConditionOutcome::Empty;
    }
    let mut matched = Vec::with_capacity(condition.keywords.len());
    for keyword in &condition.keywords {
        let hit = match keyword {
            Keyword::Substring { lowered, .. } => evidence.lowered(condition.location).contains(lowered.as_str()),
            Keyword::Pattern { regex, .. } => regex.is_match(evidence.text(condition.location)),
        };
        if !hit {
            return ConditionOutcome::Unsatisfied;
        }
        matched.push(keyword.raw().to_string());
    }
    ConditionOutcome::Satisfied(matched)
}
