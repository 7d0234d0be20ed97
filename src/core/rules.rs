// src/core/rules.rs

//! Fingerprint rule model and loader.
//!
//! Rules arrive as a JSON array of `{cms, level, logic, tags, conditions}`
//! objects. String-typed fields are turned into closed enums here, so an
//! unknown `location` or `matcher` fails the load instead of silently never
//! matching at scan time.

use crate::core::error::LoadError;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Which response-derived value a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Location {
    Header = 0,
    Body = 1,
    Title = 2,
    Favicon = 3,
    Path = 4,
}

/// How a condition's keywords are tested. Both are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Matcher {
    /// Substring containment (`"match"` in rule files).
    #[strum(serialize = "match")]
    Substring,
    #[strum(serialize = "regex")]
    Regex,
}

/// How a rule combines its conditions. Missing or unrecognized values mean `And`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    fn from_field(raw: Option<&str>) -> (Self, bool) {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("and") => (Logic::And, true),
            Some("or") => (Logic::Or, true),
            _ => (Logic::And, false),
        }
    }
}

/// A single keyword, pre-processed for its matcher.
#[derive(Debug, Clone)]
pub enum Keyword {
    Substring { raw: String, lowered: String },
    Pattern { raw: String, regex: Regex },
}

impl Keyword {
    pub fn raw(&self) -> &str {
        match self {
            Keyword::Substring { raw, .. } | Keyword::Pattern { raw, .. } => raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub location: Location,
    pub matcher: Matcher,
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone)]
pub struct FingerprintRule {
    pub cms: String,
    /// Confidence, 1-5.
    pub level: u8,
    pub logic: Logic,
    pub tags: Vec<String>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    location: String,
    matcher: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    cms: String,
    #[serde(default)]
    level: i64,
    #[serde(default)]
    logic: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

/// Reads and compiles the rule file at `path`.
pub fn load_rules(path: &Path) -> Result<Vec<FingerprintRule>, LoadError> {
    let data = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<RawRule> = serde_json::from_str(&data).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = compile_rules(raw)?;
    info!(path = %path.display(), rules = rules.len(), "Fingerprint rules loaded.");
    Ok(rules)
}

/// Compiles rules from an in-memory JSON document.
pub fn rules_from_json(json: &str) -> Result<Vec<FingerprintRule>, LoadError> {
    let raw: Vec<RawRule> = serde_json::from_str(json).map_err(|source| LoadError::Json {
        path: "<inline>".into(),
        source,
    })?;
    compile_rules(raw)
}

fn compile_rules(raw: Vec<RawRule>) -> Result<Vec<FingerprintRule>, LoadError> {
    let mut rules = Vec::with_capacity(raw.len());
    for rule in raw {
        if let Some(compiled) = compile_rule(rule)? {
            rules.push(compiled);
        }
    }
    Ok(rules)
}

/// `Ok(None)` drops a rule whose regex keyword does not compile.
fn compile_rule(raw: RawRule) -> Result<Option<FingerprintRule>, LoadError> {
    let invalid = |reason: String| LoadError::InvalidRule { cms: raw.cms.clone(), reason };

    let (logic, explicit) = Logic::from_field(raw.logic.as_deref());
    if !explicit {
        debug!(cms = %raw.cms, logic = ?raw.logic, "Rule logic missing or unrecognized, using `and`.");
    }

    let level = if (1..=5).contains(&raw.level) {
        raw.level as u8
    } else {
        let clamped = raw.level.clamp(1, 5) as u8;
        warn!(cms = %raw.cms, level = raw.level, clamped, "Rule level outside 1-5, clamping.");
        clamped
    };

    let mut conditions = Vec::with_capacity(raw.conditions.len());
    for cond in &raw.conditions {
        let location: Location = cond
            .location
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| invalid(format!("unknown location `{}`", cond.location)))?;
        let matcher: Matcher = cond
            .matcher
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| invalid(format!("unknown matcher `{}`", cond.matcher)))?;

        let mut keywords = Vec::with_capacity(cond.keywords.len());
        for keyword in &cond.keywords {
            match matcher {
                Matcher::Substring => keywords.push(Keyword::Substring {
                    raw: keyword.clone(),
                    lowered: keyword.to_lowercase(),
                }),
                Matcher::Regex => match RegexBuilder::new(keyword).case_insensitive(true).build() {
                    Ok(regex) => keywords.push(Keyword::Pattern { raw: keyword.clone(), regex }),
                    Err(e) => {
                        warn!(cms = %raw.cms, pattern = %keyword, error = %e, "Skipping rule with invalid regex.");
                        return Ok(None);
                    }
                },
            }
        }
        conditions.push(Condition { location, matcher, keywords });
    }

    Ok(Some(FingerprintRule {
        cms: raw.cms,
        level,
        logic,
        tags: raw.tags,
        conditions,
    }))
}
