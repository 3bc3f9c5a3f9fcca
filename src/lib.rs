//! rangefetch - Download accelerator for a single HTTP resource
//!
//! This library fetches one remote resource and writes it to local storage,
//! splitting it into parallel byte-range requests when the server supports
//! them and falling back to one continuous transfer otherwise.
//!
//! # Features
//!
//! - **Capability Probe**: A `HEAD` request decides between ranged and single-stream paths
//! - **Parallel Chunks**: One task per chunk, joined at a single assembly barrier
//! - **MD5 Verification**: Bytes on disk are checked against the bytes received
//! - **Bounded Retry**: Each chunk (and the fallback) retries on its own budget
//! - **Structured Report**: Every run ends in a serializable [`DownloadReport`]
//!
//! # Example
//!
//! ```no_run
//! use rangefetch::{download_file, DownloadConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig {
//!     requested_chunks: 8,
//!     ..DownloadConfig::new("https://example.com/video.mp4", "video.mp4")
//! };
//!
//! let report = download_file(&config).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

mod download;
mod error;
mod fallback;
mod merge;
mod metadata;
mod orchestrator;
mod plan;
mod retry;
mod transport;
mod types;
mod verify;

pub use download::ChunkWorker;
pub use error::FetchError;
pub use fallback::SingleStreamFallback;
pub use metadata::{capability_from_headers, probe_capability};
pub use orchestrator::{download_file, Downloader};
pub use plan::{effective_chunk_count, plan_chunks};
pub use retry::{AttemptReport, RetryPolicy};
pub use transport::{BodyResponse, ByteStream, HeadResponse, HttpTransport, Transport};
pub use types::{
    ByteRange, ChunkOutcome, ChunkSpec, DownloadConfig, DownloadPlan, DownloadReport,
    DownloadStatus, ResourceCapability, Strategy,
};
