//! Single continuous transfer for servers without range support.

use crate::download::stream_body_to_file;
use crate::error::FetchError;
use crate::retry::{run_attempts, AttemptReport, AttemptTask, RetryPolicy};
use crate::transport::Transport;
use crate::verify::{verify_persisted, Transferred};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Streams the whole resource straight into the destination file.
pub struct SingleStreamFallback {
    transport: Arc<dyn Transport>,
    url: String,
    destination: PathBuf,
    progress: ProgressBar,
}

impl SingleStreamFallback {
    pub fn new(transport: Arc<dyn Transport>, url: &str, destination: &Path) -> Self {
        Self {
            transport,
            url: url.to_string(),
            destination: destination.to_path_buf(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the transfer to a terminal state.
    ///
    /// On success the destination already is the final artifact.
    ///
    /// # Arguments
    ///
    /// * `policy` - Attempt budget and pause between attempts
    ///
    /// # Returns
    ///
    /// An [`AttemptReport`] with the attempts used and, when exhausted, the
    /// error of the final attempt.
    pub async fn run(mut self, policy: &RetryPolicy) -> AttemptReport {
        info!("Downloading {} as a single stream", self.url);
        run_attempts(&mut self, policy).await
    }
}

#[async_trait]
impl AttemptTask for SingleStreamFallback {
    type Receipt = Transferred;

    fn label(&self) -> String {
        "single stream".to_string()
    }

    async fn transfer(&mut self, _attempt: u32) -> Result<Transferred, FetchError> {
        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let response = self.transport.get(&self.url, None).await?;
        if !response.status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                url: self.url.clone(),
                status: response.status.as_u16(),
            });
        }

        stream_body_to_file(response.body, &self.destination).await
    }

    async fn verify(&mut self, receipt: Transferred) -> Result<(), FetchError> {
        verify_persisted(&self.destination, &receipt, None).await?;
        self.progress.inc(receipt.bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{BodyResponse, HeadResponse};
    use crate::types::ByteRange;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Answers every GET with `status`; the first `broken` bodies fail mid-stream.
    struct WholeServer {
        data: Vec<u8>,
        broken: AtomicU32,
        status: StatusCode,
        ranged_requests: AtomicU32,
    }

    #[async_trait]
    impl Transport for WholeServer {
        async fn head(&self, _url: &str) -> Result<HeadResponse, FetchError> {
            Ok(HeadResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
            })
        }

        async fn get(
            &self,
            _url: &str,
            range: Option<ByteRange>,
        ) -> Result<BodyResponse, FetchError> {
            if range.is_some() {
                self.ranged_requests.fetch_add(1, Ordering::SeqCst);
            }
            let half = Bytes::copy_from_slice(&self.data[..self.data.len() / 2]);
            let rest = Bytes::copy_from_slice(&self.data[self.data.len() / 2..]);
            let broken = self
                .broken
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let second = if broken {
                Err(FetchError::IoError(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )))
            } else {
                Ok(rest)
            };
            Ok(BodyResponse {
                status: self.status,
                body: futures_util::stream::iter(vec![Ok(half), second]).boxed(),
            })
        }
    }

    fn server(broken: u32, status: StatusCode) -> Arc<WholeServer> {
        Arc::new(WholeServer {
            data: b"the quick brown fox jumps over the lazy dog".to_vec(),
            broken: AtomicU32::new(broken),
            status,
            ranged_requests: AtomicU32::new(0),
        })
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_fallback_writes_destination() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("nested").join("out.txt");
        let server = server(0, StatusCode::OK);

        let report = SingleStreamFallback::new(server.clone(), "http://localhost/f", &destination)
            .run(&policy())
            .await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert_eq!(
            std::fs::read(&destination).unwrap(),
            b"the quick brown fox jumps over the lazy dog"
        );
        assert_eq!(server.ranged_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_retries_once() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("out.txt");

        let report =
            SingleStreamFallback::new(server(1, StatusCode::OK), "http://localhost/f", &destination)
                .run(&policy())
                .await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_fallback_gives_up_after_two_attempts() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("out.txt");

        let report =
            SingleStreamFallback::new(server(5, StatusCode::OK), "http://localhost/f", &destination)
                .run(&policy())
                .await;

        assert!(!report.succeeded());
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_fallback_rejects_error_status() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("out.txt");

        let report = SingleStreamFallback::new(
            server(0, StatusCode::INTERNAL_SERVER_ERROR),
            "http://localhost/f",
            &destination,
        )
        .run(&policy())
        .await;

        assert!(matches!(
            report.error,
            Some(FetchError::UnexpectedStatus { status: 500, .. })
        ));
    }
}
