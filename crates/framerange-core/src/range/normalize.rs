//! Interval sweep that brings an arbitrary set of labeled ranges into normalized form.
//!
//! Every input range contributes two keypoints, `start - 0.5` and `end + 0.5`.
//! Consecutive keypoints delimit buckets that are each either fully inside or
//! fully outside every input, so label assignment is a containment test. The
//! half-frame bias makes touching inputs (`[0, 20]` and `[21, 30]`) share the
//! keypoint `20.5` instead of leaving a phantom gap between them.
//!
//! Keypoints are kept in doubled integer coordinates (`2 * start - 1` and
//! `2 * end + 1`), which are always odd and never need floating point.

use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::models::{FrameIndex, LabelSet, RangeLabel};

/// Transient sub-interval produced during normalization. Unlike [`RangeLabel`]
/// its label set may be empty, meaning no input covers it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RangeBucket {
    pub(crate) start_frame: FrameIndex,
    pub(crate) end_frame: FrameIndex,
    pub(crate) label_ids: LabelSet,
}

fn lower_key(frame: FrameIndex) -> i64 {
    2 * frame as i64 - 1
}

fn upper_key(frame: FrameIndex) -> i64 {
    2 * frame as i64 + 1
}

/// First whole frame to the right of an (odd) keypoint.
fn frame_after_key(key: i64) -> FrameIndex {
    ((key + 1) / 2) as FrameIndex
}

/// Last whole frame to the left of an (odd) keypoint.
fn frame_before_key(key: i64) -> FrameIndex {
    ((key - 1) / 2) as FrameIndex
}

fn collect_keypoints(range_labels: &[RangeLabel]) -> BTreeSet<i64> {
    let mut keypoints = BTreeSet::new();
    for range in range_labels {
        keypoints.insert(lower_key(range.start_frame()));
        keypoints.insert(upper_key(range.end_frame()));
    }
    keypoints
}

fn init_buckets(keypoints: &BTreeSet<i64>) -> Vec<RangeBucket> {
    keypoints
        .iter()
        .zip(keypoints.iter().skip(1))
        .map(|(&left, &right)| RangeBucket {
            start_frame: frame_after_key(left),
            end_frame: frame_before_key(right),
            label_ids: LabelSet::new(),
        })
        .collect()
}

fn assign_labels(buckets: &mut [RangeBucket], range_labels: &[RangeLabel]) {
    for range in range_labels {
        let first = buckets.partition_point(|b| b.start_frame < range.start_frame());
        for bucket in buckets[first..].iter_mut() {
            if bucket.end_frame > range.end_frame() {
                break;
            }
            bucket.label_ids.extend(range.label_ids().iter().cloned());
        }
    }
}

/// Materialize a merged bucket. Empty buckets are unannotated gaps and
/// yield `None`; any other rejection means the sweep produced a bad bound.
fn bucket_to_label(bucket: RangeBucket) -> Option<RangeLabel> {
    if bucket.label_ids.is_empty() {
        return None;
    }
    match RangeLabel::new(bucket.start_frame, bucket.end_frame, bucket.label_ids) {
        Ok(range) => Some(range),
        Err(e) => {
            error!(
                start_frame = bucket.start_frame,
                end_frame = bucket.end_frame,
                "normalize produced an invalid bucket: {e}"
            );
            debug_assert!(false, "normalize produced an invalid bucket: {e}");
            None
        }
    }
}

fn merge_adjacent(buckets: Vec<RangeBucket>) -> Vec<RangeBucket> {
    let mut merged: Vec<RangeBucket> = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        match merged.last_mut() {
            Some(previous)
                if previous.end_frame + 1 == bucket.start_frame
                    && previous.label_ids == bucket.label_ids =>
            {
                previous.start_frame = previous.start_frame.min(bucket.start_frame);
                previous.end_frame = previous.end_frame.max(bucket.end_frame);
            }
            _ => merged.push(bucket),
        }
    }
    merged
}

/// Convert arbitrary (overlapping, unsorted, redundant) labeled ranges into
/// normalized form: sorted by start, non-overlapping, and with no two touching
/// ranges carrying the same label set. Frames covered by several inputs get
/// the union of their labels.
pub fn normalize(range_labels: &[RangeLabel]) -> Vec<RangeLabel> {
    if range_labels.is_empty() {
        return Vec::new();
    }

    let keypoints = collect_keypoints(range_labels);
    let mut buckets = init_buckets(&keypoints);
    assign_labels(&mut buckets, range_labels);
    let bucket_count = buckets.len();
    let merged = merge_adjacent(buckets);

    let normalized: Vec<RangeLabel> = merged.into_iter().filter_map(bucket_to_label).collect();

    debug!(
        inputs = range_labels.len(),
        buckets = bucket_count,
        outputs = normalized.len(),
        "normalized range labels"
    );
    normalized
}

/// Whether `range_labels` already satisfies the normalized-form invariants.
pub fn is_normalized(range_labels: &[RangeLabel]) -> bool {
    range_labels.windows(2).all(|pair| {
        let (left, right) = (&pair[0], &pair[1]);
        let ordered = left.end_frame() < right.start_frame();
        let mergeable =
            left.end_frame() + 1 == right.start_frame() && left.label_ids() == right.label_ids();
        ordered && !mergeable
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
