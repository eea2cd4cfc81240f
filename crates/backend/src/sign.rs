//! SigV4 request signing.
//!
//! One helper shared by the client facade and the signing proxy. The
//! caller supplies the payload hash so a request body that was already
//! buffered is not hashed twice.

use std::time::SystemTime;

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;

use crate::error::BackendError;

/// Service name used in the credential scope.
const SERVICE: &str = "xray";

/// Sign an HTTP request, returning the headers to add to it.
///
/// `body_hash` is the lower-case hex SHA-256 of the request body. The
/// returned set always contains `authorization` and `x-amz-date`, plus
/// `x-amz-content-sha256` (mirroring `body_hash`) and, with temporary
/// credentials, `x-amz-security-token`.
pub async fn sign_request(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body_hash: &str,
    region: &str,
    credentials: &SharedCredentialsProvider,
    time: SystemTime,
) -> Result<Vec<(String, String)>, BackendError> {
    let creds = credentials
        .provide_credentials()
        .await
        .map_err(|e| BackendError::Credentials(e.to_string()))?;
    let identity = creds.into();

    let mut settings = SigningSettings::default();
    settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

    let params = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(SERVICE)
        .time(time)
        .settings(settings)
        .build()
        .map_err(|e| BackendError::Signing(e.to_string()))?
        .into();

    let signable_headers = headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()));
    let signable = SignableRequest::new(
        method,
        url,
        signable_headers,
        SignableBody::Precomputed(body_hash.to_string()),
    )
    .map_err(|e| BackendError::Signing(e.to_string()))?;

    let (instructions, _signature) = sign(signable, &params)
        .map_err(|e| BackendError::Signing(e.to_string()))?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

/// Lower-case hex SHA-256 of a request body.
pub fn payload_hash(body: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::Credentials;

    fn test_provider(session_token: Option<&str>) -> SharedCredentialsProvider {
        SharedCredentialsProvider::new(Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            session_token.map(str::to_string),
            None,
            "test",
        ))
    }

    #[test]
    fn test_payload_hash_matches_known_vector() {
        // sha256 of the empty string.
        assert_eq!(
            payload_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        // sha256 of "X".
        assert_eq!(
            payload_hash(b"X"),
            "4b68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015"
        );
    }

    #[tokio::test]
    async fn test_signed_headers_present() {
        let headers = sign_request(
            "POST",
            "https://xray.us-east-1.amazonaws.com/TraceSegments",
            &[("host".to_string(), "xray.us-east-1.amazonaws.com".to_string())],
            &payload_hash(b"{}"),
            "us-east-1",
            &test_provider(None),
            SystemTime::UNIX_EPOCH,
        )
        .await
        .unwrap();

        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert!(names.contains(&"authorization"));
        assert!(names.contains(&"x-amz-date"));
        assert!(names.contains(&"x-amz-content-sha256"));
        assert!(!names.contains(&"x-amz-security-token"));

        let sha = headers
            .iter()
            .find(|(name, _)| name == "x-amz-content-sha256")
            .map(|(_, value)| value.as_str())
            .unwrap();
        assert_eq!(sha, payload_hash(b"{}"));
    }

    #[tokio::test]
    async fn test_temporary_credentials_add_token() {
        let headers = sign_request(
            "POST",
            "https://xray.us-east-1.amazonaws.com/TraceSegments",
            &[],
            &payload_hash(b""),
            "us-east-1",
            &test_provider(Some("SESSIONTOKEN")),
            SystemTime::UNIX_EPOCH,
        )
        .await
        .unwrap();

        assert!(headers
            .iter()
            .any(|(name, _)| name == "x-amz-security-token"));
    }
}
