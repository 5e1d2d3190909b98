//! Shared guardrails for caller-supplied annotation parameters.

use crate::models::{FrameIndex, MAX_FRAME_INDEX};

// Range annotation guards
pub const MIN_SKIP_FRAME: u64 = 1;
pub const MAX_SKIP_FRAME: u64 = 10_000;
pub const DEFAULT_SKIP_FRAME: u64 = 1;
pub const MAX_RANGES_PER_POST: usize = 100_000;
pub const MAX_LABELS_PER_RANGE: usize = 256;
pub const MAX_LOOKUP_CACHE_CAPACITY: usize = 4096;
pub const MAX_LOADED_RANGES: usize = 64;

pub fn clamp_int(value: u64, minimum: u64, maximum: u64) -> u64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_skip_frame(value: u64) -> u64 {
    clamp_int(value, MIN_SKIP_FRAME, MAX_SKIP_FRAME)
}

pub fn clamp_cache_capacity(value: usize) -> usize {
    value.clamp(1, MAX_LOOKUP_CACHE_CAPACITY)
}

/// Last frame a sample at `frame_index` may cover with the given stride.
pub fn sample_span_end(frame_index: FrameIndex, skip_frame: u64) -> FrameIndex {
    frame_index
        .saturating_add(clamp_skip_frame(skip_frame) - 1)
        .min(MAX_FRAME_INDEX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_skip_frame() {
        assert_eq!(clamp_skip_frame(0), 1);
        assert_eq!(clamp_skip_frame(5), 5);
        assert_eq!(clamp_skip_frame(u64::MAX), MAX_SKIP_FRAME);
    }

    #[test]
    fn test_clamp_cache_capacity() {
        assert_eq!(clamp_cache_capacity(0), 1);
        assert_eq!(clamp_cache_capacity(16), 16);
        assert_eq!(clamp_cache_capacity(usize::MAX), MAX_LOOKUP_CACHE_CAPACITY);
    }

    #[test]
    fn test_sample_span_end() {
        assert_eq!(sample_span_end(10, 1), 10);
        assert_eq!(sample_span_end(10, 5), 14);
        assert_eq!(sample_span_end(MAX_FRAME_INDEX, 5), MAX_FRAME_INDEX);
    }
}
