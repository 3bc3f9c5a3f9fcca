//! Chunk assembly into the final artifact.

use crate::error::FetchError;
use crate::types::ChunkOutcome;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, warn};

/// Concatenates verified chunk artifacts, in index order, into `destination`.
///
/// Must only be called once every chunk worker has finished.
///
/// # Arguments
///
/// * `outcomes` - Terminal outcome of every planned chunk, in any order
/// * `destination` - Final artifact path, created or truncated
/// * `expected_size` - Probed resource size
///
/// # Returns
///
/// The number of bytes written to `destination`.
///
/// # Errors
///
/// * `ChunksExhausted` if any outcome failed; the destination is not touched.
/// * `AssemblyFailed` if copying a chunk fails; the partial destination is removed.
/// * `SizeMismatch` if the assembled file does not have `expected_size` bytes;
///   the file is kept for inspection.
///
/// On success the chunk artifacts are deleted and the final length returned.
pub(crate) async fn assemble_chunks(
    outcomes: &[ChunkOutcome],
    destination: &Path,
    expected_size: u64,
) -> Result<u64, FetchError> {
    let mut failed: Vec<u32> = outcomes
        .iter()
        .filter(|o| !o.succeeded || o.artifact_path.is_none())
        .map(|o| o.spec.index)
        .collect();
    if !failed.is_empty() {
        failed.sort_unstable();
        return Err(FetchError::ChunksExhausted(failed));
    }

    let mut ordered: Vec<&ChunkOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.spec.index);

    if let Err(e) = write_chunks(&ordered, destination).await {
        if let Err(remove_err) = tokio::fs::remove_file(destination).await {
            if remove_err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove partial output {}: {}",
                    destination.display(),
                    remove_err
                );
            }
        }
        return Err(FetchError::AssemblyFailed(e.to_string()));
    }

    let actual = tokio::fs::metadata(destination).await?.len();
    if actual != expected_size {
        return Err(FetchError::SizeMismatch {
            path: destination.to_path_buf(),
            expected: expected_size,
            actual,
        });
    }

    for outcome in &ordered {
        if let Some(path) = &outcome.artifact_path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!("Failed to remove chunk artifact {}: {}", path.display(), e);
            }
        }
    }

    info!(
        "Merged {} chunks into {} ({} bytes)",
        ordered.len(),
        destination.display(),
        actual
    );
    Ok(actual)
}

/// Best-effort removal of every artifact still referenced by `outcomes`.
pub(crate) async fn discard_artifacts(outcomes: &[ChunkOutcome]) {
    for path in outcomes.iter().filter_map(|o| o.artifact_path.as_ref()) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove chunk artifact {}: {}", path.display(), e),
        }
    }
}

async fn write_chunks(ordered: &[&ChunkOutcome], destination: &Path) -> Result<(), FetchError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut output = BufWriter::new(tokio::fs::File::create(destination).await?);
    for outcome in ordered {
        let Some(path) = &outcome.artifact_path else {
            continue;
        };
        let mut input = tokio::fs::File::open(path).await.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("part {} ({}): {}", outcome.spec.index, path.display(), e),
            )
        })?;
        tokio::io::copy(&mut input, &mut output).await?;
    }
    output.flush().await?;

    Ok(())
}
