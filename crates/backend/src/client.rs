//! Client facade over the X-Ray service API.
//!
//! Two calls, both JSON POSTs against the resolved endpoint:
//! `/TraceSegments` for segment batches and `/TelemetryRecords` for
//! self-telemetry. Requests are SigV4-signed and stamped with the daemon
//! user-agent and a send-time header.
//!
//! The facade is a trait so the pipeline can run against a mock in tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use url::Url;

use crate::error::BackendError;
use crate::sign::{payload_hash, sign_request};
use crate::types::{PutSegmentsOutput, TelemetryMeta, TelemetryRecord};

/// Idle upstream connections are kept longer than the telemetry cadence
/// (60 s) so the periodic upload reuses its connection.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// HTTP/2 ping interval for reaping half-open connections.
const H2_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Time after an unanswered ping before the connection is closed.
const H2_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Response bodies are truncated to this length in error messages.
const ERROR_BODY_LIMIT: usize = 256;

/// The service API surface the daemon consumes.
#[async_trait]
pub trait XRayApi: Send + Sync {
    /// Upload a batch of raw segment documents.
    async fn put_segments(&self, documents: Vec<String>) -> Result<PutSegmentsOutput, BackendError>;

    /// Upload telemetry records.
    async fn put_telemetry(
        &self,
        records: Vec<TelemetryRecord>,
        meta: &TelemetryMeta,
    ) -> Result<(), BackendError>;
}

/// Connection settings for [`XRayClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Resolved service endpoint.
    pub endpoint: Url,

    /// Signing region.
    pub region: String,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Idle connections kept per host.
    pub max_idle_per_host: usize,

    /// Skip TLS certificate verification.
    pub no_verify_ssl: bool,

    /// Explicit outbound proxy. `None` falls back to HTTPS_PROXY.
    pub proxy_address: Option<String>,
}

/// Signed `reqwest`-backed implementation of [`XRayApi`].
pub struct XRayClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: SharedCredentialsProvider,
    user_agent: String,
}

impl XRayClient {
    /// Build a client from settings and a credential provider.
    pub fn new(
        settings: ClientSettings,
        credentials: SharedCredentialsProvider,
    ) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .http2_keep_alive_interval(H2_KEEP_ALIVE_INTERVAL)
            .http2_keep_alive_timeout(H2_KEEP_ALIVE_TIMEOUT)
            .http2_keep_alive_while_idle(true)
            .danger_accept_invalid_certs(settings.no_verify_ssl);

        // Explicit proxy wins; otherwise reqwest picks up HTTPS_PROXY
        // from the environment on its own.
        if let Some(proxy) = settings.proxy_address.as_deref() {
            tracing::debug!(proxy = %proxy, "using outbound proxy");
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint: settings.endpoint,
            region: settings.region,
            credentials,
            user_agent: daemon_user_agent(),
        })
    }

    async fn post_json(&self, path: &str, body: Vec<u8>) -> Result<reqwest::Response, BackendError> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| BackendError::InvalidEndpoint {
                endpoint: format!("{}{}", self.endpoint, path),
                source: e,
            })?;

        let host = url.host_str().unwrap_or_default().to_string();
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        let hash = payload_hash(&body);
        let to_sign = [
            ("host".to_string(), host_header),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let signed_headers = sign_request(
            "POST",
            url.as_str(),
            &to_sign,
            &hash,
            &self.region,
            &self.credentials,
            SystemTime::now(),
        )
        .await?;

        let mut request = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .header("X-Amzn-Xray-Timestamp", xray_timestamp())
            .body(body);
        for (name, value) in signed_headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(ERROR_BODY_LIMIT);
            return Err(BackendError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl XRayApi for XRayClient {
    async fn put_segments(&self, documents: Vec<String>) -> Result<PutSegmentsOutput, BackendError> {
        let body = serde_json::to_vec(&serde_json::json!({
            "TraceSegmentDocuments": documents,
        }))?;

        let response = self.post_json("/TraceSegments", body).await?;
        let output = response
            .json::<PutSegmentsOutput>()
            .await
            .unwrap_or_default();
        Ok(output)
    }

    async fn put_telemetry(
        &self,
        records: Vec<TelemetryRecord>,
        meta: &TelemetryMeta,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_vec(&serde_json::json!({
            "EC2InstanceId": meta.instance_id,
            "Hostname": meta.hostname,
            "ResourceARN": meta.resource_arn,
            "TelemetryRecords": records,
        }))?;

        self.post_json("/TelemetryRecords", body).await?;
        Ok(())
    }
}

/// The daemon user-agent:
/// `xray-agent/xray-daemon/<version> exec-env/<env> OS/<os>-<arch>`.
fn daemon_user_agent() -> String {
    let exec_env = std::env::var("AWS_EXECUTION_ENV").unwrap_or_default();
    let exec_env = if exec_env.is_empty() {
        "UNKNOWN".to_string()
    } else {
        exec_env
    };
    format!(
        "xray-agent/xray-daemon/{} exec-env/{} OS/{}-{}",
        env!("CARGO_PKG_VERSION"),
        exec_env,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

/// Request send time as fractional seconds with nanosecond precision.
fn xray_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:09}", now.as_secs(), now.subsec_nanos())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
