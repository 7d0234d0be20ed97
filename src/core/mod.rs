// src/core/mod.rs

// Root of the `core` module: the scan pipeline and the data it works on.

/// Data structures shared by every stage: endpoints, requests, CDN verdicts,
/// detections and scan records.
pub mod models;

/// Liveness probing, HTTP fetching, response analysis, fingerprint matching
/// and the scheduler that ties them together.
pub mod scanner;

/// Static reference tables and tuning constants.
pub mod knowledge_base;

pub mod cdn;
pub mod config;
pub mod error;
pub mod pool;
pub mod resolver;
pub mod rules;
pub mod targets;
