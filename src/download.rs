//! Chunk download functionality.

use crate::error::FetchError;
use crate::retry::{run_attempts, AttemptTask, RetryPolicy};
use crate::transport::{ByteStream, Transport};
use crate::types::{ChunkOutcome, ChunkSpec};
use crate::verify::{verify_persisted, ReceivedDigest, Transferred};
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::ProgressBar;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, warn};

/// Deterministic artifact path of chunk `index` inside `chunk_dir`.
pub(crate) fn chunk_artifact_path(chunk_dir: &Path, index: u32) -> PathBuf {
    chunk_dir.join(format!("part_{}", index))
}

/// Streams `body` into `path`, hashing every buffer before it is written.
///
/// The file is created or truncated first, and flushed before returning.
pub(crate) async fn stream_body_to_file(
    mut body: ByteStream,
    path: &Path,
) -> Result<Transferred, FetchError> {
    let mut file = BufWriter::new(tokio::fs::File::create(path).await?);
    let mut digest = ReceivedDigest::new();

    while let Some(piece) = body.next().await {
        let piece = piece?;
        digest.update(&piece);
        file.write_all(&piece).await?;
    }
    file.flush().await?;

    Ok(digest.finish())
}

/// Downloads one [`ChunkSpec`] into its own artifact file.
///
/// Each worker owns a disjoint byte range and a disjoint output path, so any
/// number of them can run side by side without coordination.
pub struct ChunkWorker {
    transport: Arc<dyn Transport>,
    url: String,
    spec: ChunkSpec,
    artifact_path: PathBuf,
    progress: ProgressBar,
}

impl ChunkWorker {
    pub fn new(
        transport: Arc<dyn Transport>,
        url: &str,
        spec: ChunkSpec,
        chunk_dir: &Path,
    ) -> Self {
        Self {
            transport,
            url: url.to_string(),
            spec,
            artifact_path: chunk_artifact_path(chunk_dir, spec.index),
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports verified bytes to `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the chunk to a terminal state and describes it.
    ///
    /// An exhausted chunk removes whatever partial artifact it left behind.
    ///
    /// # Arguments
    ///
    /// * `policy` - Attempt budget and pause between attempts
    ///
    /// # Returns
    ///
    /// A [`ChunkOutcome`]. A failed outcome carries a
    /// [`FetchError::ChunkExhausted`] message naming the last cause.
    pub async fn run(mut self, policy: &RetryPolicy) -> ChunkOutcome {
        let report = run_attempts(&mut self, policy).await;

        match report.error {
            None => {
                self.progress.inc(self.spec.len());
                info!(
                    "Part {} finished downloading ({} bytes, {} attempt(s))",
                    self.spec.index,
                    self.spec.len(),
                    report.attempts
                );
                ChunkOutcome {
                    spec: self.spec,
                    artifact_path: Some(self.artifact_path),
                    attempts_used: report.attempts,
                    succeeded: true,
                    last_error: None,
                }
            }
            Some(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&self.artifact_path).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            "Failed to remove {}: {}",
                            self.artifact_path.display(),
                            remove_err
                        );
                    }
                }
                let exhausted = FetchError::ChunkExhausted {
                    index: self.spec.index,
                    attempts: report.attempts,
                    reason: e.to_string(),
                };
                ChunkOutcome {
                    spec: self.spec,
                    artifact_path: None,
                    attempts_used: report.attempts,
                    succeeded: false,
                    last_error: Some(exhausted.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl AttemptTask for ChunkWorker {
    type Receipt = Transferred;

    fn label(&self) -> String {
        format!("chunk {}", self.spec.index)
    }

    async fn transfer(&mut self, _attempt: u32) -> Result<Transferred, FetchError> {
        let response = self
            .transport
            .get(&self.url, Some(self.spec.range()))
            .await?;

        // A 200 means the server ignored the range and is sending the whole resource.
        if response.status != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::UnexpectedStatus {
                url: self.url.clone(),
                status: response.status.as_u16(),
            });
        }

        stream_body_to_file(response.body, &self.artifact_path).await
    }

    async fn verify(&mut self, receipt: Transferred) -> Result<(), FetchError> {
        verify_persisted(&self.artifact_path, &receipt, Some(self.spec.len())).await
    }
}
