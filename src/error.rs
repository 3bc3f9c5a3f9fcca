//! Error types for download operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing, fetching or assembling a resource.
#[derive(Error, Debug)]
pub enum FetchError {
    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP request error during download.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// The configuration cannot produce a valid download plan.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The metadata (HEAD) request failed.
    #[error("Capability probe failed for {url}: {reason}")]
    ProbeFailed { url: String, reason: String },

    /// The server answered a transfer with a status we cannot use.
    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Fewer or more bytes arrived than the request asked for.
    #[error("Length mismatch: expected {expected} bytes, received {actual} bytes")]
    LengthMismatch { expected: u64, actual: u64 },

    /// The bytes on disk do not hash to the bytes that were received.
    #[error("MD5 mismatch for {}: received {received}, persisted {persisted}", path.display())]
    DigestMismatch {
        path: PathBuf,
        received: String,
        persisted: String,
    },

    /// A chunk never verified within its attempt budget.
    #[error("Chunk {index} exhausted after {attempts} attempts: {reason}")]
    ChunkExhausted {
        index: u32,
        attempts: u32,
        reason: String,
    },

    /// One or more chunks were exhausted; assembly was not attempted.
    #[error("Assembly aborted, chunks failed: {0:?}")]
    ChunksExhausted(Vec<u32>),

    /// Concatenating chunk artifacts into the destination failed.
    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    /// The final file does not have the probed size.
    #[error("Size mismatch for {}: expected {expected} bytes, got {actual} bytes", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// The non-ranged fallback never verified within its attempt budget.
    #[error("Single stream download failed after {attempts} attempts: {reason}")]
    SingleStreamExhausted { attempts: u32, reason: String },
}
