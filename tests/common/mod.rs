// tests/common/mod.rs
#![allow(dead_code)]

use dfinger::core::config::ScanConfig;
use dfinger::core::error::ScanError;
use dfinger::core::models::ScanRecord;
use dfinger::core::scanner::ResultSink;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the test server saw.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn host(&self) -> &str {
        self.headers.get("host").map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn html(body: &str) -> Self {
        Self::status(200).header("Content-Type", "text/html; charset=utf-8").body(body.as_bytes())
    }

    pub fn status(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Vec::new() }
    }

    pub fn not_found() -> Self {
        Self::status(404).header("Content-Type", "text/plain").body(b"not found")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }
}

type Handler = dyn Fn(&Request, usize) -> Reply + Send + Sync;

/// Minimal HTTP/1.1 server: one request per connection, no request bodies.
/// The handler gets the request and how many times its path has been hit
/// (1 on the first request).
pub struct TestServer {
    pub addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request, usize) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let (h, r) = (Arc::clone(&hits), Arc::clone(&requests));
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let (handler, hits, requests) = (Arc::clone(&handler), Arc::clone(&h), Arc::clone(&r));
                tokio::spawn(async move {
                    let _ = serve(stream, handler, hits, requests).await;
                });
            }
        });
        Self { addr, hits, requests, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    handler: Arc<Handler>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    requests: Arc<Mutex<Vec<Request>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or("/").to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let request = Request { method, path, headers };

    let count = {
        let mut hits = hits.lock().unwrap();
        let count = hits.entry(request.path.clone()).or_insert(0);
        *count += 1;
        *count
    };
    requests.lock().unwrap().push(request.clone());
    let reply = handler(&request, count);

    let reason = StatusCode::from_u16(reply.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut out = format!("HTTP/1.1 {} {}\r\n", reply.status, reason);
    for (name, value) in &reply.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", reply.body.len()));
    stream.write_all(out.as_bytes()).await?;
    if request.method != "HEAD" {
        stream.write_all(&reply.body).await?;
    }
    stream.shutdown().await
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Fast settings for local tests: short timeout and retry delay, no DNS servers.
pub fn test_config() -> ScanConfig {
    ScanConfig {
        concurrency: 8,
        timeout: Duration::from_secs(2),
        retry_delay: Duration::from_millis(10),
        dns_servers: Vec::new(),
        output_file: None,
        ..ScanConfig::default()
    }
}

/// Records everything reported to it.
#[derive(Default)]
pub struct CollectingSink {
    pub records: Mutex<Vec<ScanRecord>>,
    pub failures: Mutex<Vec<String>>,
}

impl ResultSink for CollectingSink {
    fn report(&self, record: &ScanRecord) {
        self.records.lock().unwrap().push(record.clone());
    }

    fn failed(&self, url: &str, _error: &ScanError) {
        self.failures.lock().unwrap().push(url.to_string());
    }
}
