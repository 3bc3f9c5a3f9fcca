//! Capability probing through a metadata-only request.

use crate::error::FetchError;
use crate::transport::Transport;
use crate::types::ResourceCapability;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH};
use tracing::info;

/// Reads size and range support out of `HEAD` response headers.
///
/// A missing or unparsable `Content-Length` yields a size of 0 (unknown).
/// A missing `Accept-Ranges`, or `Accept-Ranges: none`, means ranges are
/// not supported.
pub fn capability_from_headers(headers: &HeaderMap) -> ResourceCapability {
    let total_size = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let supports_range = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|s| !s.trim().eq_ignore_ascii_case("none"))
        .unwrap_or(false);

    ResourceCapability {
        total_size,
        supports_range,
    }
}

/// Probes `url` for its size and range support.
///
/// No retry happens here; a transport error or a non-success status is
/// returned as [`FetchError::ProbeFailed`].
pub async fn probe_capability(
    transport: &dyn Transport,
    url: &str,
) -> Result<ResourceCapability, FetchError> {
    info!("Probing {}", url);

    let response = transport
        .head(url)
        .await
        .map_err(|e| FetchError::ProbeFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status.is_success() {
        return Err(FetchError::ProbeFailed {
            url: url.to_string(),
            reason: format!("HEAD request failed with status {}", response.status),
        });
    }

    let capability = capability_from_headers(&response.headers);
    info!(
        "Resource size: {} bytes, range requests: {}",
        capability.total_size,
        if capability.supports_range {
            "supported"
        } else {
            "not supported"
        }
    );
    Ok(capability)
}
