//! Service endpoint construction.
//!
//! The X-Ray endpoint is derived from the region unless an explicit
//! override is configured. Partition is detected from the region prefix;
//! unknown prefixes fall through to the default partition.

use url::Url;

use crate::error::BackendError;

/// Domain suffix per partition, keyed by region prefix.
const PARTITION_SUFFIXES: &[(&str, &str)] = &[
    ("cn-", "amazonaws.com.cn"),
    ("us-isob-", "sc2s.sgov.gov"),
    ("us-iso-", "c2s.ic.gov"),
];

/// Default partition domain suffix (commercial and GovCloud regions).
const DEFAULT_SUFFIX: &str = "amazonaws.com";

/// Resolve the X-Ray service endpoint.
///
/// An explicit `endpoint_override` wins. Otherwise the endpoint is
/// `https://xray.<region>.<suffix>` with the suffix chosen by partition.
pub fn resolve_endpoint(region: &str, endpoint_override: &str) -> Result<Url, BackendError> {
    if !endpoint_override.is_empty() {
        return Url::parse(endpoint_override).map_err(|e| BackendError::InvalidEndpoint {
            endpoint: endpoint_override.to_string(),
            source: e,
        });
    }

    if region.is_empty() {
        return Err(BackendError::NoRegion);
    }

    let suffix = domain_suffix(region);
    let endpoint = format!("https://xray.{region}.{suffix}");
    Url::parse(&endpoint).map_err(|e| BackendError::InvalidEndpoint {
        endpoint,
        source: e,
    })
}

/// Domain suffix for a region. The `us-isob-` entry is checked before
/// `us-iso-` because the latter is a prefix of the former.
fn domain_suffix(region: &str) -> &'static str {
    PARTITION_SUFFIXES
        .iter()
        .find(|(prefix, _)| region.starts_with(prefix))
        .map(|(_, suffix)| *suffix)
        .unwrap_or(DEFAULT_SUFFIX)
}
