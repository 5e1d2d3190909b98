//! Shared typed models used across the range engine, storage, and service layers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{FrameRangeError, FrameRangeResult};

// ---------------------------------------------------------------------------
// Scalar aliases and limits
// ---------------------------------------------------------------------------

/// Zero-based offset of a frame along a video's timeline.
pub type FrameIndex = u64;

/// Identifier of a label from the task's label schema.
pub type LabelId = String;

/// Canonical (sorted, deduplicated) set of label ids.
pub type LabelSet = BTreeSet<LabelId>;

/// Largest frame index accepted anywhere in the crate.
///
/// Normalization works on doubled coordinates (`2 * frame + 1`), which must
/// stay representable as `i64`.
pub const MAX_FRAME_INDEX: FrameIndex = (i64::MAX as u64 - 1) / 2;

/// Derive a short range identifier (first 16 hex chars of SHA-256) from a video id.
pub fn range_id_from_video_id(video_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(video_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

// ---------------------------------------------------------------------------
// 1. RangeLabel
// ---------------------------------------------------------------------------

/// A closed frame interval paired with the labels that apply to every frame in it.
///
/// Only obtainable through [`RangeLabel::new`] (or deserialization, which goes
/// through the same checks), so every value in circulation satisfies
/// `start_frame <= end_frame` and has at least one label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RangeLabelDocument", into = "RangeLabelDocument")]
pub struct RangeLabel {
    start_frame: FrameIndex,
    end_frame: FrameIndex,
    label_ids: LabelSet,
}

impl RangeLabel {
    pub fn new<I, S>(start_frame: FrameIndex, end_frame: FrameIndex, label_ids: I) -> FrameRangeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<LabelId>,
    {
        if start_frame > end_frame {
            return Err(FrameRangeError::Validation(format!(
                "start_frame {start_frame} is greater than end_frame {end_frame}"
            )));
        }
        if end_frame > MAX_FRAME_INDEX {
            return Err(FrameRangeError::Validation(format!(
                "end_frame {end_frame} exceeds the maximum frame index {MAX_FRAME_INDEX}"
            )));
        }
        let label_ids: LabelSet = label_ids.into_iter().map(Into::into).collect();
        if label_ids.is_empty() {
            return Err(FrameRangeError::Validation(format!(
                "range [{start_frame}, {end_frame}] must carry at least one label id"
            )));
        }
        Ok(Self {
            start_frame,
            end_frame,
            label_ids,
        })
    }

    /// Build a range from signed bounds, as received from documents and bindings.
    pub fn from_signed<I, S>(start_frame: i64, end_frame: i64, label_ids: I) -> FrameRangeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<LabelId>,
    {
        let start = frame_from_signed("start_frame", start_frame)?;
        let end = frame_from_signed("end_frame", end_frame)?;
        Self::new(start, end, label_ids)
    }

    pub fn start_frame(&self) -> FrameIndex {
        self.start_frame
    }

    pub fn end_frame(&self) -> FrameIndex {
        self.end_frame
    }

    pub fn label_ids(&self) -> &LabelSet {
        &self.label_ids
    }

    /// Whether `frame_index` lies inside `[start_frame, end_frame]`.
    pub fn contains(&self, frame_index: FrameIndex) -> bool {
        self.start_frame <= frame_index && frame_index <= self.end_frame
    }

    /// Number of frames covered by this range.
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }
}

/// Validate a signed frame index and convert it to [`FrameIndex`].
pub fn frame_from_signed(field: &str, value: i64) -> FrameRangeResult<FrameIndex> {
    if value < 0 {
        return Err(FrameRangeError::Validation(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    Ok(value as FrameIndex)
}

// ---------------------------------------------------------------------------
// 2. Persisted documents
// ---------------------------------------------------------------------------

/// Wire shape of one `range_labels` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeLabelDocument {
    pub start_frame: i64,
    pub end_frame: i64,
    pub label_ids: Vec<LabelId>,
}

impl TryFrom<RangeLabelDocument> for RangeLabel {
    type Error = FrameRangeError;

    fn try_from(doc: RangeLabelDocument) -> FrameRangeResult<Self> {
        RangeLabel::from_signed(doc.start_frame, doc.end_frame, doc.label_ids)
    }
}

impl From<RangeLabel> for RangeLabelDocument {
    fn from(range: RangeLabel) -> Self {
        // Bounds are capped at MAX_FRAME_INDEX on construction, so both fit in i64.
        Self {
            start_frame: range.start_frame as i64,
            end_frame: range.end_frame as i64,
            label_ids: range.label_ids.into_iter().collect(),
        }
    }
}

/// Stored form of a video's annotation range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAnnotationRangeDocument {
    pub id: String,
    pub video_id: String,
    #[serde(default)]
    pub range_labels: Vec<RangeLabel>,
}

// ---------------------------------------------------------------------------
// 3. Sampled per-frame annotations
// ---------------------------------------------------------------------------

/// Labels observed on one sampled frame, as posted by annotation clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLabels {
    pub frame_index: FrameIndex,
    #[serde(default)]
    pub label_ids: Vec<LabelId>,
}

impl FrameLabels {
    pub fn new<I, S>(frame_index: FrameIndex, label_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<LabelId>,
    {
        Self {
            frame_index,
            label_ids: label_ids.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_label_rejects_inverted_bounds() {
        let err = RangeLabel::new(5, 2, ["a"]).unwrap_err();
        assert!(matches!(err, FrameRangeError::Validation(_)));
    }

    #[test]
    fn test_range_label_rejects_empty_labels() {
        let err = RangeLabel::new(0, 3, Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, FrameRangeError::Validation(_)));
    }

    #[test]
    fn test_range_label_rejects_negative_bounds() {
        assert!(RangeLabel::from_signed(-1, 3, ["a"]).is_err());
        assert!(RangeLabel::from_signed(0, -3, ["a"]).is_err());
        assert!(RangeLabel::from_signed(0, 3, ["a"]).is_ok());
    }

    #[test]
    fn test_range_label_rejects_oversized_frame() {
        assert!(RangeLabel::new(0, MAX_FRAME_INDEX, ["a"]).is_ok());
        assert!(RangeLabel::new(0, MAX_FRAME_INDEX + 1, ["a"]).is_err());
    }

    #[test]
    fn test_range_label_equality_ignores_label_order() {
        let a = RangeLabel::new(1, 4, ["x", "y"]).unwrap();
        let b = RangeLabel::new(1, 4, ["y", "x", "y"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(b.label_ids().len(), 2);
    }

    #[test]
    fn test_range_label_single_frame() {
        let r = RangeLabel::new(7, 7, ["a"]).unwrap();
        assert!(r.contains(7));
        assert!(!r.contains(6));
        assert!(!r.contains(8));
        assert_eq!(r.frame_count(), 1);
    }

    #[test]
    fn test_document_json_shape() {
        let doc = VideoAnnotationRangeDocument {
            id: "abc".to_string(),
            video_id: "video-1".to_string(),
            range_labels: vec![RangeLabel::new(0, 3, ["b", "a"]).unwrap()],
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "abc",
                "video_id": "video-1",
                "range_labels": [
                    {"start_frame": 0, "end_frame": 3, "label_ids": ["a", "b"]}
                ]
            })
        );
    }

    #[test]
    fn test_document_deserialize_validates_ranges() {
        let raw = r#"{"id": "x", "video_id": "v",
            "range_labels": [{"start_frame": 5, "end_frame": 2, "label_ids": ["a"]}]}"#;
        assert!(serde_json::from_str::<VideoAnnotationRangeDocument>(raw).is_err());

        let raw = r#"{"id": "x", "video_id": "v",
            "range_labels": [{"start_frame": -1, "end_frame": 2, "label_ids": ["a"]}]}"#;
        assert!(serde_json::from_str::<VideoAnnotationRangeDocument>(raw).is_err());

        let raw = r#"{"id": "x", "video_id": "v",
            "range_labels": [{"start_frame": 0, "end_frame": 2, "label_ids": []}]}"#;
        assert!(serde_json::from_str::<VideoAnnotationRangeDocument>(raw).is_err());
    }

    #[test]
    fn test_document_missing_range_labels_defaults_empty() {
        let doc: VideoAnnotationRangeDocument =
            serde_json::from_str(r#"{"id": "x", "video_id": "v"}"#).unwrap();
        assert!(doc.range_labels.is_empty());
    }

    #[test]
    fn test_range_id_deterministic() {
        let a = range_id_from_video_id("video-42");
        let b = range_id_from_video_id("video-42");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, range_id_from_video_id("video-43"));
    }
}
