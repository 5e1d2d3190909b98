//! Conversion of sampled per-frame annotations into labeled ranges.
//!
//! Annotation clients that label every `skip_frame`-th frame post one sample
//! per labeled frame. Each sample stands for the frames up to the next
//! sample (at most `skip_frame` frames) and for nothing past the end of the
//! video.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::models::{FrameIndex, FrameLabels, RangeLabel, MAX_FRAME_INDEX};
use crate::ops::guards::sample_span_end;
use crate::range::normalize::normalize;

/// Spans resolved from a sampled post: labeled ranges plus the closed spans
/// of samples that carried no labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampledSpans {
    pub range_labels: Vec<RangeLabel>,
    pub cleared: Vec<(FrameIndex, FrameIndex)>,
}

/// Resolve sampled frame annotations into labeled and cleared spans.
///
/// Samples may arrive in any order; when a frame is sampled twice the later
/// sample wins. Samples at or beyond `frame_count` (when known) are ignored.
pub fn frames_to_spans(
    frames: &[FrameLabels],
    skip_frame: u64,
    frame_count: Option<u64>,
) -> FrameRangeResult<SampledSpans> {
    let samples: BTreeMap<FrameIndex, &FrameLabels> =
        frames.iter().map(|f| (f.frame_index, f)).collect();

    let mut ranges = Vec::with_capacity(samples.len());
    let mut cleared = Vec::new();
    let mut dropped = 0usize;
    let mut iter = samples.iter().peekable();
    while let Some((&frame_index, sample)) = iter.next() {
        if frame_count.is_some_and(|count| frame_index >= count) {
            dropped += 1;
            continue;
        }
        if frame_index > MAX_FRAME_INDEX {
            return Err(FrameRangeError::Validation(format!(
                "sampled frame {frame_index} exceeds the maximum frame index {MAX_FRAME_INDEX}"
            )));
        }

        let mut end_frame = sample_span_end(frame_index, skip_frame);
        if let Some(&(&next_frame, _)) = iter.peek() {
            end_frame = end_frame.min(next_frame - 1);
        }
        if let Some(count) = frame_count {
            end_frame = end_frame.min(count - 1);
        }

        if sample.label_ids.is_empty() {
            cleared.push((frame_index, end_frame));
            continue;
        }
        ranges.push(RangeLabel::new(
            frame_index,
            end_frame,
            sample.label_ids.iter().cloned(),
        )?);
    }

    debug!(
        samples = samples.len(),
        ranges = ranges.len(),
        cleared = cleared.len(),
        dropped,
        skip_frame,
        "converted frame samples to ranges"
    );
    Ok(SampledSpans {
        range_labels: normalize(&ranges),
        cleared,
    })
}

/// Turn sampled frame annotations into normalized range labels. Samples
/// without labels leave their span unannotated.
pub fn frames_to_range_labels(
    frames: &[FrameLabels],
    skip_frame: u64,
    frame_count: Option<u64>,
) -> FrameRangeResult<Vec<RangeLabel>> {
    Ok(frames_to_spans(frames, skip_frame, frame_count)?.range_labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FrameRangeError;

    fn rl(start: FrameIndex, end: FrameIndex, labels: &[&str]) -> RangeLabel {
        RangeLabel::new(start, end, labels.iter().copied()).unwrap()
    }

    #[test]
    fn test_every_frame_sampled() {
        let frames = vec![
            FrameLabels::new(0, ["a"]),
            FrameLabels::new(1, ["a"]),
            FrameLabels::new(2, ["b"]),
        ];
        let ranges = frames_to_range_labels(&frames, 1, None).unwrap();
        assert_eq!(ranges, vec![rl(0, 1, &["a"]), rl(2, 2, &["b"])]);
    }

    #[test]
    fn test_samples_extend_by_skip_frame() {
        let frames = vec![FrameLabels::new(0, ["a"]), FrameLabels::new(5, ["b"])];
        let ranges = frames_to_range_labels(&frames, 5, None).unwrap();
        assert_eq!(ranges, vec![rl(0, 4, &["a"]), rl(5, 9, &["b"])]);
    }

    #[test]
    fn test_samples_stop_before_next_sample() {
        let frames = vec![FrameLabels::new(3, ["b"]), FrameLabels::new(0, ["a"])];
        let ranges = frames_to_range_labels(&frames, 10, None).unwrap();
        assert_eq!(ranges, vec![rl(0, 2, &["a"]), rl(3, 12, &["b"])]);
    }

    #[test]
    fn test_empty_sample_leaves_gap() {
        let frames = vec![
            FrameLabels::new(0, ["a"]),
            FrameLabels::new(2, Vec::<String>::new()),
            FrameLabels::new(4, ["a"]),
        ];
        let ranges = frames_to_range_labels(&frames, 2, None).unwrap();
        assert_eq!(ranges, vec![rl(0, 1, &["a"]), rl(4, 5, &["a"])]);
    }

    #[test]
    fn test_empty_samples_reported_as_cleared() {
        let frames = vec![
            FrameLabels::new(0, ["a"]),
            FrameLabels::new(5, Vec::<String>::new()),
            FrameLabels::new(7, ["b"]),
            FrameLabels::new(20, Vec::<String>::new()),
        ];
        let spans = frames_to_spans(&frames, 5, Some(22)).unwrap();
        assert_eq!(spans.range_labels, vec![rl(0, 4, &["a"]), rl(7, 11, &["b"])]);
        assert_eq!(spans.cleared, vec![(5, 6), (20, 21)]);
    }

    #[test]
    fn test_frame_count_truncates() {
        let frames = vec![FrameLabels::new(8, ["a"]), FrameLabels::new(12, ["b"])];
        let ranges = frames_to_range_labels(&frames, 5, Some(10)).unwrap();
        assert_eq!(ranges, vec![rl(8, 9, &["a"])]);
    }

    #[test]
    fn test_duplicate_sample_later_wins() {
        let frames = vec![FrameLabels::new(0, ["a"]), FrameLabels::new(0, ["b"])];
        let ranges = frames_to_range_labels(&frames, 3, None).unwrap();
        assert_eq!(ranges, vec![rl(0, 2, &["b"])]);
    }

    #[test]
    fn test_zero_skip_frame_treated_as_one() {
        let frames = vec![FrameLabels::new(4, ["a"])];
        let ranges = frames_to_range_labels(&frames, 0, None).unwrap();
        assert_eq!(ranges, vec![rl(4, 4, &["a"])]);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frames = vec![FrameLabels::new(u64::MAX, ["a"])];
        let err = frames_to_range_labels(&frames, 1, None).unwrap_err();
        assert!(matches!(err, FrameRangeError::Validation(_)));
    }
}
