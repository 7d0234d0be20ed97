// src/lib.rs

//! `dfinger`: concurrent web fingerprinting.
//!
//! Candidate endpoints are TCP-probed for liveness, domains are resolved and
//! triaged for CDN fronting, every address is fetched over HTTP (with retry and
//! client-redirect following), and each page is matched against declarative
//! fingerprint rules. See [`app::App`] for the assembled pipeline.

pub mod app;
pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;
