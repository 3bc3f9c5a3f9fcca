//! Transfer integrity checks (MD5 of received bytes vs. persisted bytes).

use crate::error::FetchError;
use md5::{Digest, Md5};
use std::path::Path;
use tracing::debug;

/// Digest and length of the bytes that came off the wire.
///
/// Built incrementally while the body is streamed, so the digest reflects
/// every buffer before it is written and before the stream is drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transferred {
    pub bytes: u64,
    pub md5: String,
}

/// Running MD5 over a response body.
#[derive(Default)]
pub(crate) struct ReceivedDigest {
    hasher: Md5,
    bytes: u64,
}

impl ReceivedDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, piece: &[u8]) {
        self.hasher.update(piece);
        self.bytes += piece.len() as u64;
    }

    pub fn finish(self) -> Transferred {
        Transferred {
            bytes: self.bytes,
            md5: format!("{:x}", self.hasher.finalize()),
        }
    }
}

/// Computes the MD5 hash of a local file.
///
/// This function reads the file in chunks to avoid loading large files
/// entirely into memory. It runs in a blocking task to avoid blocking
/// the async runtime.
pub(crate) async fn compute_file_md5(path: &Path) -> Result<String, FetchError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        use std::io::Read;

        let file = std::fs::File::open(&path)?;
        let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; 1024 * 1024];

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok::<String, FetchError>(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| FetchError::IoError(std::io::Error::other(format!("Task join error: {}", e))))?
}

/// Checks that `path` holds exactly the bytes described by `received`.
///
/// When `expected_len` is given, the received length must match it first.
pub(crate) async fn verify_persisted(
    path: &Path,
    received: &Transferred,
    expected_len: Option<u64>,
) -> Result<(), FetchError> {
    if let Some(expected) = expected_len {
        if received.bytes != expected {
            return Err(FetchError::LengthMismatch {
                expected,
                actual: received.bytes,
            });
        }
    }

    let persisted = compute_file_md5(path).await?;
    if persisted != received.md5 {
        return Err(FetchError::DigestMismatch {
            path: path.to_path_buf(),
            received: received.md5.clone(),
            persisted,
        });
    }

    debug!("MD5 verified for {} ({})", path.display(), persisted);
    Ok(())
}
