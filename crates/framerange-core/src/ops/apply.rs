//! Application of posted annotations to a video's range.

use serde::{Deserialize, Serialize};

use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::models::{FrameIndex, FrameLabels, LabelId, RangeLabel};
use crate::ops::frames::{frames_to_spans, SampledSpans};
use crate::ops::guards::{MAX_LABELS_PER_RANGE, MAX_RANGES_PER_POST};
use crate::range::VideoAnnotationRange;

/// How a posted set of ranges is combined with what is already stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Drop every stored interval and keep only the posted ones.
    #[default]
    Replace,
    /// Write each posted range over the stored intervals, in order.
    Overwrite,
}

/// Body of a range annotation post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeAnnotationPayload {
    /// Explicit labeled ranges.
    Ranges { range_labels: Vec<RangeLabel> },
    /// Sampled frames, expanded with the post's `skip_frame` stride.
    Frames {
        frames: Vec<FrameLabels>,
        #[serde(default)]
        frame_count: Option<u64>,
    },
}

impl RangeAnnotationPayload {
    fn entry_count(&self) -> usize {
        match self {
            Self::Ranges { range_labels } => range_labels.len(),
            Self::Frames { frames, .. } => frames.len(),
        }
    }

    fn max_labels(&self) -> usize {
        match self {
            Self::Ranges { range_labels } => range_labels
                .iter()
                .map(|r| r.label_ids().len())
                .max()
                .unwrap_or(0),
            Self::Frames { frames, .. } => {
                frames.iter().map(|f| f.label_ids.len()).max().unwrap_or(0)
            }
        }
    }
}

/// Outcome of applying a post, reported back to callers and logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub intervals_before: usize,
    pub intervals_after: usize,
    pub labeled_frames: u64,
}

/// A post resolved against its `skip_frame`, ready to apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedPost {
    pub range_labels: Vec<RangeLabel>,
    /// Spans posted without labels. Only meaningful for overwrites; a
    /// replacement already clears everything it does not name.
    pub cleared: Vec<(FrameIndex, FrameIndex)>,
}

impl From<Vec<RangeLabel>> for ResolvedPost {
    fn from(range_labels: Vec<RangeLabel>) -> Self {
        Self {
            range_labels,
            cleared: Vec::new(),
        }
    }
}

impl From<SampledSpans> for ResolvedPost {
    fn from(spans: SampledSpans) -> Self {
        Self {
            range_labels: spans.range_labels,
            cleared: spans.cleared,
        }
    }
}

fn check_label_count(count: usize) -> FrameRangeResult<()> {
    if count > MAX_LABELS_PER_RANGE {
        return Err(FrameRangeError::Validation(format!(
            "{count} labels on one range, maximum is {MAX_LABELS_PER_RANGE}"
        )));
    }
    Ok(())
}

/// Validate payload bounds and resolve it into range labels and cleared spans.
pub fn resolve_payload(
    payload: &RangeAnnotationPayload,
    skip_frame: u64,
) -> FrameRangeResult<ResolvedPost> {
    let entries = payload.entry_count();
    if entries > MAX_RANGES_PER_POST {
        return Err(FrameRangeError::Validation(format!(
            "{entries} entries posted, maximum is {MAX_RANGES_PER_POST}"
        )));
    }
    check_label_count(payload.max_labels())?;

    match payload {
        RangeAnnotationPayload::Ranges { range_labels } => Ok(range_labels.clone().into()),
        RangeAnnotationPayload::Frames {
            frames,
            frame_count,
        } => Ok(frames_to_spans(frames, skip_frame, *frame_count)?.into()),
    }
}

/// Combine a resolved post with the stored intervals according to `mode`.
pub fn apply_range_labels(
    range: &mut VideoAnnotationRange,
    post: impl Into<ResolvedPost>,
    mode: ApplyMode,
) -> FrameRangeResult<ApplySummary> {
    let post = post.into();
    let intervals_before = range.len();
    match mode {
        ApplyMode::Replace => range.replace_range_labels(post.range_labels),
        ApplyMode::Overwrite => {
            for (start_frame, end_frame) in post.cleared {
                range.set_labels_in_range(start_frame, end_frame, Vec::<LabelId>::new())?;
            }
            for posted in post.range_labels {
                range.set_labels_in_range(
                    posted.start_frame(),
                    posted.end_frame(),
                    posted.label_ids().iter().cloned(),
                )?;
            }
        }
    }
    Ok(ApplySummary {
        intervals_before,
        intervals_after: range.len(),
        labeled_frames: range.labeled_frame_count(),
    })
}

/// Apply a single-frame annotation; an empty label list clears the frame.
pub fn apply_frame_labels(
    range: &mut VideoAnnotationRange,
    frame_index: FrameIndex,
    label_ids: Vec<LabelId>,
) -> FrameRangeResult<ApplySummary> {
    check_label_count(label_ids.len())?;
    let intervals_before = range.len();
    range.set_labels_at_frame(frame_index, label_ids)?;
    Ok(ApplySummary {
        intervals_before,
        intervals_after: range.len(),
        labeled_frames: range.labeled_frame_count(),
    })
}
