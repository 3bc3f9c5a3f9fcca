//! Chunk count clamping and range partitioning.

use crate::error::FetchError;
use crate::types::ChunkSpec;
use tracing::info;

/// Clamps the requested chunk count down to `max_chunks`.
///
/// Both values must be at least 1.
pub fn effective_chunk_count(requested: u32, max_chunks: u32) -> Result<u32, FetchError> {
    if requested == 0 {
        return Err(FetchError::InvalidConfig(
            "requested chunk count must be at least 1".to_string(),
        ));
    }
    if max_chunks == 0 {
        return Err(FetchError::InvalidConfig(
            "maximum chunk count must be at least 1".to_string(),
        ));
    }

    if requested > max_chunks {
        info!(
            "Cannot download {} chunks in parallel, using the maximum of {}",
            requested, max_chunks
        );
        return Ok(max_chunks);
    }
    Ok(requested)
}

/// Splits `[0, total_size - 1]` into `chunk_count` contiguous segments.
///
/// Every segment but the last spans `total_size / chunk_count` bytes; the last
/// one absorbs the remainder.
///
/// # Errors
///
/// `InvalidConfig` if `total_size` is 0, `chunk_count` is 0, or there are more
/// chunks than bytes.
pub fn plan_chunks(total_size: u64, chunk_count: u32) -> Result<Vec<ChunkSpec>, FetchError> {
    if total_size == 0 {
        return Err(FetchError::InvalidConfig(
            "cannot plan chunks for an empty or unknown size".to_string(),
        ));
    }
    if chunk_count == 0 {
        return Err(FetchError::InvalidConfig(
            "chunk count must be at least 1".to_string(),
        ));
    }
    if u64::from(chunk_count) > total_size {
        return Err(FetchError::InvalidConfig(format!(
            "{} chunks cannot partition {} bytes",
            chunk_count, total_size
        )));
    }

    let base_size = total_size / u64::from(chunk_count);
    let last = chunk_count - 1;

    Ok((0..chunk_count)
        .map(|index| {
            let start = u64::from(index) * base_size;
            let end_inclusive = if index == last {
                total_size - 1
            } else {
                start + base_size - 1
            };
            ChunkSpec {
                index,
                start,
                end_inclusive,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(total_size: u64, specs: &[ChunkSpec]) {
        assert_eq!(specs.first().map(|s| s.start), Some(0));
        assert_eq!(specs.last().map(|s| s.end_inclusive), Some(total_size - 1));
        for pair in specs.windows(2) {
            assert_eq!(pair[0].end_inclusive + 1, pair[1].start);
        }
        let covered: u64 = specs.iter().map(|s| s.len()).sum();
        assert_eq!(covered, total_size);
    }

    #[test]
    fn test_even_split() {
        let specs = plan_chunks(1000, 4).unwrap();
        let ranges: Vec<(u64, u64)> = specs.iter().map(|s| (s.start, s.end_inclusive)).collect();
        assert_eq!(ranges, vec![(0, 249), (250, 499), (500, 749), (750, 999)]);
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        let specs = plan_chunks(1003, 4).unwrap();
        assert_eq!(specs[3].start, 750);
        assert_eq!(specs[3].end_inclusive, 1002);
        assert_eq!(specs[3].len(), 253);
        assert_partition(1003, &specs);
    }

    #[test]
    fn test_indices_are_ordinal() {
        let specs = plan_chunks(97, 7).unwrap();
        let indices: Vec<u32> = specs.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_partition_holds_for_many_sizes() {
        for total_size in [1u64, 2, 19, 20, 21, 999, 1000, 4096, 65_537] {
            for chunk_count in 1..=20u32 {
                if u64::from(chunk_count) > total_size {
                    continue;
                }
                let specs = plan_chunks(total_size, chunk_count).unwrap();
                assert_eq!(specs.len(), chunk_count as usize);
                assert_partition(total_size, &specs);
            }
        }
    }

    #[test]
    fn test_single_chunk_covers_everything() {
        let specs = plan_chunks(42, 1).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!((specs[0].start, specs[0].end_inclusive), (0, 41));
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(plan_chunks(0, 4).is_err());
        assert!(plan_chunks(100, 0).is_err());
        assert!(plan_chunks(3, 4).is_err());
    }

    #[test]
    fn test_effective_chunk_count_clamps_down() {
        assert_eq!(effective_chunk_count(50, 20).unwrap(), 20);
        assert_eq!(effective_chunk_count(20, 20).unwrap(), 20);
        assert_eq!(effective_chunk_count(4, 20).unwrap(), 4);
    }

    #[test]
    fn test_effective_chunk_count_rejects_zero() {
        assert!(effective_chunk_count(0, 20).is_err());
        assert!(effective_chunk_count(4, 0).is_err());
    }
}
