//! Main orchestration logic: probe, choose a strategy, fan out, assemble.

use crate::download::ChunkWorker;
use crate::error::FetchError;
use crate::fallback::SingleStreamFallback;
use crate::merge::{assemble_chunks, discard_artifacts};
use crate::metadata::probe_capability;
use crate::plan::plan_chunks;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    ChunkOutcome, DownloadConfig, DownloadPlan, DownloadReport, DownloadStatus,
    ResourceCapability, Strategy,
};
use futures_util::future::join_all;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Downloads a single resource according to a [`DownloadConfig`].
///
/// # Example
///
/// ```no_run
/// use rangefetch::{DownloadConfig, Downloader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DownloadConfig::new("https://example.com/video.mp4", "video.mp4");
/// let report = Downloader::new(config)?.run().await?;
/// println!("{:?}", report.status);
/// # Ok(())
/// # }
/// ```
pub struct Downloader {
    config: DownloadConfig,
    transport: Arc<dyn Transport>,
    progress: ProgressBar,
}

/// What one strategy produced.
struct StrategyResult {
    strategy: Strategy,
    chunks: Vec<ChunkOutcome>,
    bytes_written: u64,
    status: DownloadStatus,
}

impl Downloader {
    /// Creates a downloader backed by `reqwest`.
    pub fn new(config: DownloadConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a downloader on top of any [`Transport`].
    pub fn with_transport(config: DownloadConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports verified bytes to `progress`. Hidden by default.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the download to completion.
    ///
    /// `Err` is returned when the configuration is invalid, the probe fails,
    /// or local file system access outside a retried transfer fails. Every
    /// other outcome, including failed downloads, is described by the report.
    pub async fn run(&self) -> Result<DownloadReport, FetchError> {
        let started = Instant::now();
        let plan = DownloadPlan::from_config(&self.config)?;
        let capability = probe_capability(self.transport.as_ref(), &plan.target_url).await?;

        if let Some(size) = capability.known_size() {
            self.progress.set_length(size);
        }

        let result = if capability.allows_parallel() {
            self.run_parallel(&plan, capability).await?
        } else {
            self.run_single_stream(&plan, capability).await?
        };

        let report = DownloadReport {
            url: plan.target_url,
            destination: plan.destination,
            strategy: result.strategy,
            capability,
            chunks: result.chunks,
            bytes_written: result.bytes_written,
            status: result.status,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if report.is_success() {
            info!(
                "Download succeeded: {} bytes written to {}",
                report.bytes_written,
                report.destination.display()
            );
        } else {
            error!("Download failed: {:?}", report.status);
        }
        Ok(report)
    }

    async fn run_parallel(
        &self,
        plan: &DownloadPlan,
        capability: ResourceCapability,
    ) -> Result<StrategyResult, FetchError> {
        let total_size = capability.total_size;
        let mut chunk_count = plan.effective_chunk_count;
        if u64::from(chunk_count) > total_size {
            info!(
                "Resource has only {} bytes, reducing {} chunks to {}",
                total_size, chunk_count, total_size
            );
            chunk_count = total_size as u32;
        }

        let specs = plan_chunks(total_size, chunk_count)?;
        tokio::fs::create_dir_all(&self.config.chunk_dir).await?;

        info!(
            "Downloading {} bytes in {} parallel chunks",
            total_size, chunk_count
        );

        let policy = RetryPolicy::new(self.config.chunk_attempts, self.config.retry_delay);
        let tasks: Vec<_> = specs
            .iter()
            .map(|spec| {
                let worker = ChunkWorker::new(
                    Arc::clone(&self.transport),
                    &plan.target_url,
                    *spec,
                    &self.config.chunk_dir,
                )
                .with_progress(self.progress.clone());
                tokio::spawn(async move { worker.run(&policy).await })
            })
            .collect();

        // Assembly barrier: every chunk reaches a terminal state before we continue.
        let joined = join_all(tasks).await;

        let chunks: Vec<ChunkOutcome> = specs
            .iter()
            .zip(joined)
            .map(|(spec, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Chunk {} task failed: {}", spec.index, e);
                    ChunkOutcome {
                        spec: *spec,
                        artifact_path: None,
                        attempts_used: 0,
                        succeeded: false,
                        last_error: Some(format!("Task join error: {}", e)),
                    }
                }
            })
            .collect();

        let (status, bytes_written) =
            match assemble_chunks(&chunks, &plan.destination, total_size).await {
                Ok(written) => (DownloadStatus::Completed, written),
                Err(FetchError::ChunksExhausted(failed_chunks)) => {
                    error!("Parallel download failed, chunks {:?} exhausted", failed_chunks);
                    discard_artifacts(&chunks).await;
                    (DownloadStatus::ChunksExhausted { failed_chunks }, 0)
                }
                Err(FetchError::SizeMismatch {
                    expected, actual, ..
                }) => {
                    discard_artifacts(&chunks).await;
                    (DownloadStatus::SizeMismatch { expected, actual }, actual)
                }
                Err(e) => {
                    discard_artifacts(&chunks).await;
                    (
                        DownloadStatus::AssemblyFailed {
                            reason: e.to_string(),
                        },
                        0,
                    )
                }
            };

        Ok(StrategyResult {
            strategy: Strategy::Parallel {
                chunks: chunk_count,
            },
            chunks,
            bytes_written,
            status,
        })
    }

    async fn run_single_stream(
        &self,
        plan: &DownloadPlan,
        capability: ResourceCapability,
    ) -> Result<StrategyResult, FetchError> {
        let policy = RetryPolicy::new(self.config.fallback_attempts, self.config.retry_delay);
        let report = SingleStreamFallback::new(
            Arc::clone(&self.transport),
            &plan.target_url,
            &plan.destination,
        )
        .with_progress(self.progress.clone())
        .run(&policy)
        .await;

        if let Some(e) = report.error {
            return Ok(StrategyResult {
                strategy: Strategy::SingleStream,
                chunks: Vec::new(),
                bytes_written: 0,
                status: DownloadStatus::SingleStreamExhausted {
                    attempts: report.attempts,
                    reason: e.to_string(),
                },
            });
        }

        let actual = tokio::fs::metadata(&plan.destination).await?.len();
        let status = match capability.known_size() {
            Some(expected) if expected != actual => {
                DownloadStatus::SizeMismatch { expected, actual }
            }
            _ => DownloadStatus::Completed,
        };

        Ok(StrategyResult {
            strategy: Strategy::SingleStream,
            chunks: Vec::new(),
            bytes_written: actual,
            status,
        })
    }
}

/// Downloads the resource described by `config` over HTTP.
///
/// This is the main entry point for one-shot use.
///
/// # Example
///
/// ```no_run
/// use rangefetch::{download_file, DownloadConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DownloadConfig::new("https://example.com/video.mp4", "video.mp4");
/// download_file(&config).await?.into_result()?;
/// # Ok(())
/// # }
/// ```
pub async fn download_file(config: &DownloadConfig) -> Result<DownloadReport, FetchError> {
    Downloader::new(config.clone())?.run().await
}
