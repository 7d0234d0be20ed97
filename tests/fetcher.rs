mod common;

use common::{closed_port, test_config, Reply, TestServer};
use dfinger::core::config::ScanConfig;
use dfinger::core::error::FetchError;
use dfinger::core::models::ScanRequest;
use dfinger::core::scanner::http_fetcher::HttpFetcher;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use url::Url;

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&test_config()).unwrap()
}

fn get(url: &str) -> ScanRequest {
    ScanRequest::get(Url::parse(url).unwrap())
}

#[tokio::test]
async fn follows_meta_refresh() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/" => Reply::html(r#"<html><meta http-equiv="refresh" content="0;url=/login"></html>"#),
        "/login" => Reply::html("<title>Login</title>"),
        _ => Reply::not_found(),
    })
    .await;

    let page = fetcher().fetch(&get(&server.url("/")), 0, Duration::ZERO, 3).await.unwrap();
    assert_eq!(page.status.as_u16(), 200);
    assert_eq!(page.request.url.path(), "/login");
    assert!(page.body.contains("<title>Login</title>"));
    assert_eq!(server.hits("/login"), 1);
}

#[tokio::test]
async fn redirect_budget_is_respected() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/a" => Reply::html("<script>location.href='/b'</script>"),
        "/b" => Reply::html("<script>location.href='/c'</script>"),
        "/c" => Reply::html("<title>end</title>"),
        _ => Reply::not_found(),
    })
    .await;

    let page = fetcher().fetch(&get(&server.url("/a")), 0, Duration::ZERO, 1).await.unwrap();
    assert_eq!(page.request.url.path(), "/b");
    assert_eq!(server.hits("/c"), 0);

    let page = fetcher().fetch(&get(&server.url("/a")), 0, Duration::ZERO, 0).await.unwrap();
    assert_eq!(page.request.url.path(), "/a");
}

#[tokio::test]
async fn retries_server_errors_until_success() {
    let server = TestServer::start(|_, hit| {
        if hit < 3 { Reply::status(503).body(b"busy") } else { Reply::html("<title>up</title>") }
    })
    .await;

    let page = fetcher()
        .fetch(&get(&server.url("/flaky")), 2, Duration::from_millis(10), 0)
        .await
        .unwrap();
    assert_eq!(page.status.as_u16(), 200);
    assert_eq!(server.hits("/flaky"), 3);
}

#[tokio::test]
async fn last_server_error_is_returned_after_retries() {
    let server = TestServer::start(|_, _| Reply::status(500).header("Content-Type", "text/plain").body(b"oops")).await;

    let page = fetcher()
        .fetch(&get(&server.url("/down")), 1, Duration::from_millis(10), 0)
        .await
        .unwrap();
    assert_eq!(page.status.as_u16(), 500);
    assert_eq!(page.body, "oops");
    assert_eq!(server.hits("/down"), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = TestServer::start(|_, _| Reply::not_found()).await;
    let page = fetcher()
        .fetch(&get(&server.url("/nope")), 3, Duration::from_millis(10), 0)
        .await
        .unwrap();
    assert_eq!(page.status.as_u16(), 404);
    assert_eq!(server.hits("/nope"), 1);
}

#[tokio::test]
async fn host_header_survives_relative_redirects() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/" => Reply::html("<script>window.location = 'next'</script>"),
        "/next" => Reply::html(&format!("<title>{}</title>", req.host())),
        _ => Reply::not_found(),
    })
    .await;

    let request = ScanRequest::get(Url::parse(&format!("http://127.0.0.1:{}/", server.port())).unwrap())
        .with_host_header("app.example.test");
    let page = fetcher().fetch(&request, 0, Duration::ZERO, 3).await.unwrap();
    assert!(page.body.contains("<title>app.example.test</title>"), "{}", page.body);
    assert_eq!(page.request.url.host_str(), Some("127.0.0.1"));
    assert_eq!(page.request.host_header.as_deref(), Some("app.example.test"));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let port = closed_port().await;
    let err = fetcher()
        .fetch(&get(&format!("http://127.0.0.1:{port}/")), 1, Duration::from_millis(10), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
}

#[tokio::test]
async fn head_check_requires_success() {
    let server = TestServer::start(|req, _| match req.path.as_str() {
        "/favicon.png" => Reply::status(200).header("Content-Type", "image/png"),
        _ => Reply::not_found(),
    })
    .await;

    let f = fetcher();
    assert!(f.head_ok(&get(&server.url("/favicon.png"))).await);
    assert!(!f.head_ok(&get(&server.url("/missing.ico"))).await);
    assert!(server.requests().iter().all(|r| r.method == "HEAD"));
}

#[tokio::test]
async fn refused_connection_is_not_retried() {
    let port = closed_port().await;
    let started = Instant::now();
    let err = fetcher()
        .fetch(&get(&format!("http://127.0.0.1:{port}/")), 3, Duration::from_secs(2), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test]
async fn head_check_gives_up_before_the_request_timeout() {
    // Accepts connections and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let config = ScanConfig { timeout: Duration::from_secs(10), ..test_config() };
    let fetcher = HttpFetcher::new(&config).unwrap();
    let started = Instant::now();
    assert!(!fetcher.head_ok(&get(&format!("http://127.0.0.1:{port}/favicon.ico"))).await);
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    silent.abort();
}
