//! Tests for the signing reverse proxy.

use std::time::Duration;

use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::{self, ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::server::{ProxyConfig, ProxyServer};

fn signing_credentials() -> SharedCredentialsProvider {
    SharedCredentialsProvider::new(Credentials::new(
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
        Some("SESSIONTOKEN".into()),
        None,
        "test",
    ))
}

/// Provider whose retrieval always fails, to exercise the
/// forward-unsigned path.
#[derive(Debug)]
struct BrokenProvider;

impl ProvideCredentials for BrokenProvider {
    fn provide_credentials<'a>(&'a self) -> provider::future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        provider::future::ProvideCredentials::new(async {
            Err(CredentialsError::not_loaded("scripted failure"))
        })
    }
}

/// Accept one HTTP request and answer 200; returns the raw request head
/// and body.
async fn serve_upstream_once(listener: TcpListener) -> (String, Vec<u8>) {
    let (mut stream, _) = listener.accept().await.unwrap();

    let mut buf = Vec::new();
    let header_end;
    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "upstream connection closed early");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            header_end = pos + 4;
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length: usize = head
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("content-length:"))
        .and_then(|line| line.split(':').nth(1))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "upstream connection closed mid-body");
        body.extend_from_slice(&chunk[..n]);
    }

    stream
        .write_all(b"HTTP/1.1 200 OK\r\nx-upstream: yes\r\ncontent-length: 8\r\n\r\nupstream")
        .await
        .unwrap();
    stream.flush().await.unwrap();

    (head, body)
}

async fn proxy_to(upstream: &str, credentials: SharedCredentialsProvider) -> (std::net::SocketAddr, CancellationToken) {
    let config = ProxyConfig {
        tcp_address: "127.0.0.1:0".into(),
        endpoint: Url::parse(upstream).unwrap(),
        region: "us-east-1".into(),
        idle_conn_timeout: Duration::from_secs(30),
        max_idle_conns_per_host: 2,
        no_verify_ssl: false,
        proxy_address: None,
    };

    let server = ProxyServer::bind(config, credentials).await.unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let serve_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = server.serve(serve_cancel).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, cancel)
}

#[tokio::test]
async fn test_forwards_signed_request() {
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    let upstream = tokio::spawn(serve_upstream_once(upstream_listener));

    let (proxy_addr, cancel) = proxy_to(&format!("http://{upstream_addr}"), signing_credentials()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{proxy_addr}/TraceSegments"))
        .header("Connection", "close")
        .body("X")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "yes");
    assert_eq!(response.text().await.unwrap(), "upstream");

    let (head, body) = upstream.await.unwrap();
    let head_lower = head.to_ascii_lowercase();

    assert!(head.starts_with("POST /TraceSegments"));
    assert_eq!(body, b"X");

    // Host rewritten to the upstream authority.
    assert!(head_lower.contains(&format!("host: {upstream_addr}")));

    // Hop-by-hop header stripped, signature headers present.
    assert!(!head_lower.contains("\r\nconnection:"));
    assert!(head_lower.contains("authorization: aws4-hmac-sha256"));
    assert!(head_lower.contains("x-amz-date:"));
    assert!(head_lower.contains("x-amz-security-token:"));

    // Payload hash covers the forwarded body.
    let expected_hash = xrelay_backend::payload_hash(b"X");
    assert!(head_lower.contains(&format!("x-amz-content-sha256: {expected_hash}")));

    cancel.cancel();
}

#[tokio::test]
async fn test_forwards_unsigned_when_credentials_fail() {
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    let upstream = tokio::spawn(serve_upstream_once(upstream_listener));

    let (proxy_addr, cancel) = proxy_to(
        &format!("http://{upstream_addr}"),
        SharedCredentialsProvider::new(BrokenProvider),
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{proxy_addr}/TraceSegments"))
        .body("X")
        .send()
        .await
        .unwrap();

    // Forwarded anyway; this mock upstream accepts it.
    assert_eq!(response.status(), 200);

    let (head, _) = upstream.await.unwrap();
    assert!(!head.to_ascii_lowercase().contains("authorization:"));

    cancel.cancel();
}

#[tokio::test]
async fn test_preserves_method_path_and_query() {
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    let upstream = tokio::spawn(serve_upstream_once(upstream_listener));

    let (proxy_addr, cancel) = proxy_to(&format!("http://{upstream_addr}"), signing_credentials()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{proxy_addr}/GetSamplingRules?NextToken=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let (head, _) = upstream.await.unwrap();
    assert!(head.starts_with("GET /GetSamplingRules?NextToken=abc"));

    cancel.cancel();
}

#[tokio::test]
async fn test_upstream_unreachable_returns_bad_gateway() {
    // Point the proxy at a dead port.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let (proxy_addr, cancel) = proxy_to(&format!("http://{dead_addr}"), signing_credentials()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{proxy_addr}/TraceSegments"))
        .body("X")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    cancel.cancel();
}
