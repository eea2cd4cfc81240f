//! Daemon wiring and lifecycle.
//!
//! Builds every subsystem from the merged configuration, runs until the
//! shutdown future resolves, then tears the pipeline down in stages so
//! accepted segments drain before the process exits:
//!
//! 1. receivers stop reading,
//! 2. the ring closes and the batch processor drains it,
//! 3. the uploader workers finish the queued batches,
//! 4. telemetry takes a final snapshot and flushes,
//! 5. the proxy stops.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use xrelay_backend::{
    build_credentials, resolve_endpoint, resolve_region, ClientSettings, XRayApi, XRayClient,
};
use xrelay_config::{
    effective_memory_limit_mb, pool_buffer_count, Config, ParameterConfig,
};
use xrelay_pipeline::{Pipeline, ProcessorConfig};
use xrelay_protocol::{BufferPool, SegmentRing};
use xrelay_proxy::{ProxyConfig, ProxyServer};
use xrelay_sources::{UdpSource, UdpSourceConfig};
use xrelay_telemetry::{resolve_meta, TelemetryState, TelemetryUploader, UploaderConfig};

/// Build everything and run until `shutdown` resolves.
pub async fn run(
    config: Config,
    params: ParameterConfig,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "initializing xrelay daemon");

    // Buffer pool sized from the memory budget.
    let buffer_size = params.socket_buffer_size();
    let memory_limit = effective_memory_limit_mb(config.total_buffer_size_mb, total_host_memory_mb())
        .context("evaluating buffer memory limit")?;
    let buffer_count = pool_buffer_count(memory_limit, buffer_size)
        .context("computing buffer pool size")?;
    tracing::info!(
        memory_limit_mb = memory_limit,
        buffers = buffer_count,
        "segment buffers allocated"
    );

    let pool = Arc::new(BufferPool::new(buffer_count, buffer_size));
    let ring = Arc::new(SegmentRing::new(
        buffer_count,
        params.segment_channel_std,
        Arc::clone(&pool),
    ));
    let telemetry = Arc::new(TelemetryState::new());

    // Backend: region, credentials, endpoint, client.
    let region = resolve_region(&config.region, config.local_mode)
        .await
        .context("resolving region")?;
    tracing::info!(region = %region, "using region");

    let credentials = build_credentials(&config.role_arn, &region).await;
    let endpoint = resolve_endpoint(&region, &config.endpoint).context("resolving endpoint")?;

    let proxy_address = if config.proxy_address.is_empty() {
        None
    } else {
        Some(config.proxy_address.clone())
    };
    let client: Arc<dyn XRayApi> = Arc::new(
        XRayClient::new(
            ClientSettings {
                endpoint: endpoint.clone(),
                region: region.clone(),
                request_timeout: Duration::from_secs(params.request_timeout_s),
                max_idle_per_host: params.max_idle_conn_per_host,
                no_verify_ssl: config.no_verify_ssl,
                proxy_address: proxy_address.clone(),
            },
            credentials.clone(),
        )
        .context("building backend client")?,
    );

    // Telemetry uploader.
    let meta = resolve_meta(&config.resource_arn, config.local_mode).await;
    let telemetry_cancel = CancellationToken::new();
    let telemetry_task = tokio::spawn(
        TelemetryUploader::new(
            Arc::clone(&telemetry),
            Arc::clone(&client),
            UploaderConfig {
                meta,
                interval: None,
            },
        )
        .run(telemetry_cancel.clone()),
    );

    // Batch pipeline.
    let pipeline_cancel = CancellationToken::new();
    let pipeline = Pipeline::new(
        ProcessorConfig {
            batch_size: params.batch_size,
            idle_timeout: Duration::from_millis(params.idle_timeout_ms),
            queue_size: params.batch_processor_queue_size,
        },
        config.concurrency,
        Arc::clone(&ring),
        Arc::clone(&pool),
        Arc::clone(&client),
        Arc::clone(&telemetry),
    );
    let pipeline_task = tokio::spawn(pipeline.run(pipeline_cancel.clone()));

    // Signing proxy.
    let proxy_cancel = CancellationToken::new();
    let proxy = ProxyServer::bind(
        ProxyConfig {
            tcp_address: config.socket.tcp_address.clone(),
            endpoint,
            region,
            idle_conn_timeout: Duration::from_secs(config.proxy_server.idle_conn_timeout_s),
            max_idle_conns_per_host: config.proxy_server.max_idle_conns_per_host,
            no_verify_ssl: config.no_verify_ssl,
            proxy_address,
        },
        credentials,
    )
    .await
    .context("binding proxy server")?;
    let proxy_task = tokio::spawn(proxy.serve(proxy_cancel.clone()));

    // UDP receivers.
    let source_cancel = CancellationToken::new();
    let source = UdpSource::new(
        UdpSourceConfig {
            address: config.socket.udp_address.clone(),
            routines: params.receiver_routines,
            buffer_size,
        },
        Arc::clone(&pool),
        Arc::clone(&ring),
        Arc::clone(&telemetry),
    );
    let source_run_cancel = source_cancel.clone();
    let source_task = tokio::spawn(async move { source.run(source_run_cancel).await });

    shutdown.await;
    tracing::info!("shutdown requested, draining");

    // Stage 1: stop reading.
    source_cancel.cancel();
    source_task
        .await
        .context("joining UDP source")?
        .context("UDP source failed")?;

    // Stage 2+3: close the ring; the processor drains, closes the batch
    // queue, and the workers finish everything queued.
    ring.close();
    pipeline_cancel.cancel();
    pipeline_task.await.context("joining pipeline")?;

    // Stage 4: final telemetry snapshot and flush.
    telemetry_cancel.cancel();
    telemetry_task.await.context("joining telemetry uploader")?;

    // Stage 5: stop the proxy.
    proxy_cancel.cancel();
    proxy_task
        .await
        .context("joining proxy server")?
        .context("proxy server failed")?;

    tracing::info!(truncated = ring.truncated_count(), "shutdown finished");
    Ok(())
}

/// Total physical memory in MB, for the default buffer budget.
fn total_host_memory_mb() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory() / (1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_memory_detection() {
        // Any real machine reports something; zero would break the 1%
        // default and should be caught here rather than at startup.
        assert!(total_host_memory_mb() > 0);
    }
}
