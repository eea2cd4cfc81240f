//! Region discovery and the credential chain.
//!
//! Region priority: explicit flag/config value, then `AWS_REGION`, then
//! the ECS container metadata file, then the SDK's default provider chain
//! (which consults the instance metadata service). Local mode skips the
//! metadata-backed fallbacks entirely.

use std::env;

use aws_config::BehaviorVersion;
use aws_config::sts::AssumeRoleProvider;
use aws_credential_types::provider::SharedCredentialsProvider;

use crate::error::BackendError;

/// Resolve the region to upload to.
///
/// `configured` carries the CLI/config value and wins outright. Returns
/// [`BackendError::NoRegion`] when nothing yields a region.
pub async fn resolve_region(configured: &str, local_mode: bool) -> Result<String, BackendError> {
    if !configured.is_empty() {
        tracing::debug!(region = %configured, "using region from command line / config file");
        return Ok(configured.to_string());
    }

    if let Ok(region) = env::var("AWS_REGION") {
        if !region.is_empty() {
            tracing::debug!(region = %region, "using region from environment");
            return Ok(region);
        }
    }

    if let Some(region) = region_from_ecs_metadata() {
        tracing::debug!(region = %region, "using region from ECS metadata file");
        return Ok(region);
    }

    if !local_mode {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        if let Some(region) = shared.region() {
            tracing::debug!(region = %region, "using region from default provider chain");
            return Ok(region.to_string());
        }
    }

    Err(BackendError::NoRegion)
}

/// Region from the ECS container metadata file, when enabled.
///
/// The file's `TaskARN` field embeds the region as the fourth ARN
/// component: `arn:aws:ecs:us-west-2:...`.
fn region_from_ecs_metadata() -> Option<String> {
    let enabled = env::var("ECS_ENABLE_CONTAINER_METADATA").unwrap_or_default();
    if !enabled.eq_ignore_ascii_case("true") {
        return None;
    }

    let path = env::var("ECS_CONTAINER_METADATA_FILE").ok()?;
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "unable to open ECS metadata file");
            return None;
        }
    };

    let metadata: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "unable to read ECS metadata file contents");
            return None;
        }
    };

    let task_arn = metadata.get("TaskARN")?.as_str()?;
    region_from_task_arn(task_arn)
}

fn region_from_task_arn(arn: &str) -> Option<String> {
    let region = arn.split(':').nth(3)?;
    if region.is_empty() {
        None
    } else {
        Some(region.to_string())
    }
}

/// Build the credential provider shared by the uploader and the proxy.
///
/// Without a role ARN this is the SDK default chain. With one, STS
/// assume-role credentials are layered on top, scoped to the target
/// region so the regional STS endpoint is used.
pub async fn build_credentials(role_arn: &str, region: &str) -> SharedCredentialsProvider {
    let base = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;

    if role_arn.is_empty() {
        return base
            .credentials_provider()
            .unwrap_or_else(|| SharedCredentialsProvider::new(
                aws_credential_types::Credentials::new("", "", None, None, "missing"),
            ));
    }

    tracing::info!(role_arn = %role_arn, region = %region, "assuming role for uploads");
    let provider = AssumeRoleProvider::builder(role_arn)
        .region(aws_config::Region::new(region.to_string()))
        .session_name("xrelay")
        .configure(&base)
        .build()
        .await;
    SharedCredentialsProvider::new(provider)
}
