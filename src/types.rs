//! Data structures for download operations.

use crate::error::FetchError;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for downloading a single resource.
///
/// # Example
///
/// ```
/// use rangefetch::DownloadConfig;
/// use std::time::Duration;
///
/// let config = DownloadConfig {
///     requested_chunks: 8,
///     retry_delay: Duration::from_millis(250),
///     ..DownloadConfig::new("https://example.com/video.mp4", "video.mp4")
/// };
/// assert_eq!(config.max_chunks, 20);
/// ```
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// URL of the resource to fetch.
    pub url: String,
    /// Path of the final artifact.
    pub destination: PathBuf,
    /// Folder for temporary chunk artifacts (`part_<index>`).
    pub chunk_dir: PathBuf,
    /// Number of parallel range requests asked for (default: 4).
    pub requested_chunks: u32,
    /// Upper bound on parallel range requests (default: 20).
    pub max_chunks: u32,
    /// Attempts per chunk before it is considered exhausted (default: 3).
    pub chunk_attempts: u32,
    /// Attempts for the non-ranged fallback (default: 2).
    pub fallback_attempts: u32,
    /// Pause between two attempts of the same transfer (default: 1s).
    pub retry_delay: Duration,
    /// Per-request timeout handed to the HTTP client. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl DownloadConfig {
    /// Creates a configuration for `url` with every other field defaulted.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            destination: PathBuf::from("download.bin"),
            chunk_dir: PathBuf::from(".rangefetch.parts"),
            requested_chunks: 4,
            max_chunks: 20,
            chunk_attempts: 3,
            fallback_attempts: 2,
            retry_delay: Duration::from_secs(1),
            request_timeout: None,
        }
    }
}

/// The validated, frozen shape of one download invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub target_url: String,
    pub destination: PathBuf,
    pub requested_chunk_count: u32,
    /// `min(requested_chunk_count, max_chunk_count)`; never changes after construction.
    pub effective_chunk_count: u32,
    pub max_chunk_count: u32,
}

impl DownloadPlan {
    /// Validates `config` and computes the effective chunk count.
    pub fn from_config(config: &DownloadConfig) -> Result<Self, FetchError> {
        if config.url.trim().is_empty() {
            return Err(FetchError::InvalidConfig("target URL is empty".to_string()));
        }
        if config.chunk_attempts == 0 || config.fallback_attempts == 0 {
            return Err(FetchError::InvalidConfig(
                "attempt budgets must be at least 1".to_string(),
            ));
        }

        let effective =
            crate::plan::effective_chunk_count(config.requested_chunks, config.max_chunks)?;

        Ok(Self {
            target_url: config.url.clone(),
            destination: config.destination.clone(),
            requested_chunk_count: config.requested_chunks,
            effective_chunk_count: effective,
            max_chunk_count: config.max_chunks,
        })
    }
}

/// What the server told us about the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceCapability {
    /// Size from `Content-Length`; 0 means unknown.
    pub total_size: u64,
    /// True only when the server advertised `Accept-Ranges`.
    pub supports_range: bool,
}

impl ResourceCapability {
    /// The probed size, if the server reported one.
    pub fn known_size(&self) -> Option<u64> {
        (self.total_size > 0).then_some(self.total_size)
    }

    /// Whether the parallel ranged path can be used.
    pub fn allows_parallel(&self) -> bool {
        self.supports_range && self.total_size > 0
    }
}

/// One contiguous, inclusive byte segment of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkSpec {
    pub index: u32,
    pub start: u64,
    pub end_inclusive: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ChunkSpec {
    /// Number of bytes covered by this segment.
    pub fn len(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }

    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end_inclusive: self.end_inclusive,
        }
    }
}

/// An inclusive byte interval as sent in a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end_inclusive: u64,
}

impl ByteRange {
    /// Renders the `Range` header value, e.g. `bytes=0-249`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive)
    }
}

/// Result of one chunk worker, handed to the assembler exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    pub spec: ChunkSpec,
    /// Set only when the chunk verified.
    pub artifact_path: Option<PathBuf>,
    pub attempts_used: u32,
    pub succeeded: bool,
    /// Reason of the last failed attempt, if any.
    pub last_error: Option<String>,
}

/// Which path produced (or failed to produce) the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    Parallel { chunks: u32 },
    SingleStream,
}

/// Terminal state of a download after the strategy branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadStatus {
    Completed,
    ChunksExhausted { failed_chunks: Vec<u32> },
    AssemblyFailed { reason: String },
    SizeMismatch { expected: u64, actual: u64 },
    SingleStreamExhausted { attempts: u32, reason: String },
}

/// Structured outcome of [`crate::Downloader::run`].
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub url: String,
    pub destination: PathBuf,
    pub strategy: Strategy,
    pub capability: ResourceCapability,
    /// Per-chunk outcomes in index order; empty for the single stream path.
    pub chunks: Vec<ChunkOutcome>,
    pub bytes_written: u64,
    pub status: DownloadStatus,
    pub elapsed_ms: u64,
}

impl DownloadReport {
    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Completed
    }

    /// Converts a failed status into the matching [`FetchError`].
    pub fn into_result(self) -> Result<Self, FetchError> {
        match self.status.clone() {
            DownloadStatus::Completed => Ok(self),
            DownloadStatus::ChunksExhausted { failed_chunks } => {
                Err(FetchError::ChunksExhausted(failed_chunks))
            }
            DownloadStatus::AssemblyFailed { reason } => Err(FetchError::AssemblyFailed(reason)),
            DownloadStatus::SizeMismatch { expected, actual } => Err(FetchError::SizeMismatch {
                path: self.destination,
                expected,
                actual,
            }),
            DownloadStatus::SingleStreamExhausted { attempts, reason } => {
                Err(FetchError::SingleStreamExhausted { attempts, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_clamps_to_max() {
        let config = DownloadConfig {
            requested_chunks: 32,
            max_chunks: 20,
            ..DownloadConfig::new("http://localhost/file", "out.bin")
        };
        let plan = DownloadPlan::from_config(&config).unwrap();
        assert_eq!(plan.requested_chunk_count, 32);
        assert_eq!(plan.effective_chunk_count, 20);
    }

    #[test]
    fn test_plan_keeps_request_below_max() {
        let config = DownloadConfig::new("http://localhost/file", "out.bin");
        let plan = DownloadPlan::from_config(&config).unwrap();
        assert_eq!(plan.effective_chunk_count, 4);
    }

    #[test]
    fn test_plan_rejects_zero_chunks() {
        let config = DownloadConfig {
            requested_chunks: 0,
            ..DownloadConfig::new("http://localhost/file", "out.bin")
        };
        assert!(matches!(
            DownloadPlan::from_config(&config),
            Err(FetchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_plan_rejects_empty_url() {
        let config = DownloadConfig::default();
        assert!(DownloadPlan::from_config(&config).is_err());
    }

    #[test]
    fn test_range_header_value() {
        let spec = ChunkSpec {
            index: 1,
            start: 250,
            end_inclusive: 499,
        };
        assert_eq!(spec.len(), 250);
        assert_eq!(spec.range().header_value(), "bytes=250-499");
    }

    #[test]
    fn test_capability_branching() {
        let ranged = ResourceCapability {
            total_size: 10,
            supports_range: true,
        };
        let unknown = ResourceCapability {
            total_size: 0,
            supports_range: true,
        };
        assert!(ranged.allows_parallel());
        assert!(!unknown.allows_parallel());
        assert_eq!(unknown.known_size(), None);
    }

    #[test]
    fn test_report_into_result_maps_status() {
        let report = DownloadReport {
            url: "http://localhost/file".to_string(),
            destination: PathBuf::from("out.bin"),
            strategy: Strategy::Parallel { chunks: 2 },
            capability: ResourceCapability {
                total_size: 10,
                supports_range: true,
            },
            chunks: Vec::new(),
            bytes_written: 0,
            status: DownloadStatus::ChunksExhausted {
                failed_chunks: vec![1],
            },
            elapsed_ms: 0,
        };
        assert!(!report.is_success());
        match report.into_result() {
            Err(FetchError::ChunksExhausted(failed)) => assert_eq!(failed, vec![1]),
            other => panic!("Expected ChunksExhausted, got {:?}", other),
        }
    }
}
