mod common;

use common::{test_config, Reply, TestServer};
use dfinger::core::models::ScanRequest;
use dfinger::core::rules::rules_from_json;
use dfinger::core::scanner::favicon::favicon_hash;
use dfinger::core::scanner::fingerprint_scanner::FingerprintEngine;
use dfinger::core::scanner::http_fetcher::HttpFetcher;
use dfinger::core::scanner::response_analyzer::ResponseAnalyzer;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const ICON: &[u8] = b"hello favicon";

fn engine() -> Arc<FingerprintEngine> {
    let rules = rules_from_json(
        r#"[
            {"cms": "IconApp", "level": 3, "conditions": [
                {"location": "favicon", "matcher": "match", "keywords": ["508473084"]}
            ]},
            {"cms": "nginx", "level": 1, "conditions": [
                {"location": "header", "matcher": "regex", "keywords": ["server: nginx"]}
            ]},
            {"cms": "AdminPath", "level": 2, "logic": "and", "conditions": [
                {"location": "path", "matcher": "match", "keywords": ["/admin"]},
                {"location": "title", "matcher": "match", "keywords": ["console"]}
            ]}
        ]"#,
    )
    .unwrap();
    Arc::new(FingerprintEngine::new(rules))
}

fn analyzer() -> (HttpFetcher, ResponseAnalyzer) {
    let fetcher = HttpFetcher::new(&test_config()).unwrap();
    let analyzer = ResponseAnalyzer::new(fetcher.clone(), engine(), 1, Duration::from_millis(10));
    (fetcher, analyzer)
}

fn get(url: &str) -> ScanRequest {
    ScanRequest::get(Url::parse(url).unwrap())
}

#[tokio::test]
async fn declared_icon_is_hashed_and_rules_fire() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/admin" => Reply::html(r#"<html><head><title> Admin Console </title><link rel="icon" href="/static/i.png"></head></html>"#)
            .header("Server", "nginx/1.25.3"),
        "/static/i.png" => Reply::status(200).header("Content-Type", "image/png").body(ICON),
        _ => Reply::not_found(),
    })
    .await;

    let (fetcher, analyzer) = analyzer();
    let page = fetcher.fetch(&get(&server.url("/admin")), 0, Duration::ZERO, 0).await.unwrap();
    let analysis = analyzer.analyze(&page, "/admin").await;

    assert_eq!(analysis.title, "Admin Console");
    assert_eq!(analysis.favicon_hash, favicon_hash(ICON));
    assert_eq!(analysis.favicon_hash, "508473084");
    assert!(analysis.favicon_url.ends_with("/static/i.png"));
    assert_eq!(analysis.content_length, page.bytes.len());

    let mut names: Vec<&str> = analysis.detections.iter().map(|d| d.cms.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["AdminPath", "IconApp", "nginx"]);
}

#[tokio::test]
async fn conventional_path_found_by_head_check() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/" => Reply::html("<title>home</title>"),
        "/assets/favicon.ico" => Reply::status(200).header("Content-Type", "image/x-icon").body(ICON),
        _ => Reply::not_found(),
    })
    .await;

    let (fetcher, analyzer) = analyzer();
    let page = fetcher.fetch(&get(&server.url("/")), 0, Duration::ZERO, 0).await.unwrap();
    let analysis = analyzer.analyze(&page, "/").await;

    assert!(analysis.favicon_url.ends_with("/assets/favicon.ico"));
    assert_eq!(analysis.favicon_hash, "508473084");
    assert_eq!(server.hits("/assets/favicon.ico"), 2);
}

#[tokio::test]
async fn non_image_icon_yields_empty_hash() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/" => Reply::html("<title>home</title>"),
        "/favicon.ico" => Reply::html("<h1>soft 404</h1>"),
        _ => Reply::not_found(),
    })
    .await;

    let (fetcher, analyzer) = analyzer();
    let page = fetcher.fetch(&get(&server.url("/")), 0, Duration::ZERO, 0).await.unwrap();
    let analysis = analyzer.analyze(&page, "/").await;

    assert!(analysis.favicon_url.ends_with("/favicon.ico"));
    assert_eq!(analysis.favicon_hash, "");
    assert!(analysis.detections.iter().all(|d| d.cms != "IconApp"));
}

#[tokio::test]
async fn missing_icon_falls_back_unchecked() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/" => Reply::status(200).header("Content-Type", "application/json").body(b"{\"status\": [\"ok\"]}"),
        _ => Reply::not_found(),
    })
    .await;

    let (fetcher, analyzer) = analyzer();
    let page = fetcher.fetch(&get(&server.url("/")), 0, Duration::ZERO, 0).await.unwrap();
    let analysis = analyzer.analyze(&page, "/").await;

    assert_eq!(analysis.title, "{\"status\": \"ok\"}");
    assert!(analysis.favicon_url.ends_with("/favicon.ico"));
    assert_eq!(analysis.favicon_hash, "");
}
