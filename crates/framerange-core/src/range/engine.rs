//! Per-video annotation range: normalized interval storage with point queries
//! and localized updates.

use std::cell::RefCell;

use tracing::{debug, warn};

use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::models::{
    range_id_from_video_id, FrameIndex, LabelId, LabelSet, RangeLabel,
    VideoAnnotationRangeDocument, MAX_FRAME_INDEX,
};
use crate::range::cache::{CacheStats, FrameLookupCache, DEFAULT_LOOKUP_CACHE_CAPACITY};
use crate::range::normalize::{is_normalized, normalize};

/// Labeled frame intervals of one video, kept in normalized form.
///
/// After construction and after every mutation the intervals are sorted by
/// `start_frame`, never overlap, and no two touching intervals share a label
/// set. Frames outside every interval are unannotated.
///
/// The lookup cache sits behind a `RefCell`, so the type is `Send` but not
/// `Sync`: callers that share a range between threads must serialize access
/// themselves (see [`crate::store::locks::VideoLocks`]).
#[derive(Clone, Debug)]
pub struct VideoAnnotationRange {
    id: String,
    video_id: String,
    range_labels: Vec<RangeLabel>,
    cache: RefCell<FrameLookupCache>,
}

impl VideoAnnotationRange {
    pub fn new(video_id: impl Into<String>, range_labels: Vec<RangeLabel>) -> Self {
        Self::with_capacity(video_id, range_labels, DEFAULT_LOOKUP_CACHE_CAPACITY)
    }

    pub fn with_capacity(
        video_id: impl Into<String>,
        range_labels: Vec<RangeLabel>,
        cache_capacity: usize,
    ) -> Self {
        let video_id = video_id.into();
        Self {
            id: range_id_from_video_id(&video_id),
            video_id,
            range_labels: normalize(&range_labels),
            cache: RefCell::new(FrameLookupCache::new(cache_capacity)),
        }
    }

    /// Override the derived entity id, e.g. with the one a stored document carries.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Rebuild a range from its stored document. Stored intervals are not
    /// trusted to be normalized and go through [`normalize`] again.
    pub fn from_document(doc: VideoAnnotationRangeDocument, cache_capacity: usize) -> Self {
        if !is_normalized(&doc.range_labels) {
            warn!(
                video_id = %doc.video_id,
                intervals = doc.range_labels.len(),
                "stored range labels were not normalized; renormalizing on load"
            );
        }
        Self::with_capacity(doc.video_id, doc.range_labels, cache_capacity).with_id(doc.id)
    }

    pub fn to_document(&self) -> VideoAnnotationRangeDocument {
        VideoAnnotationRangeDocument {
            id: self.id.clone(),
            video_id: self.video_id.clone(),
            range_labels: self.range_labels.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn range_labels(&self) -> &[RangeLabel] {
        &self.range_labels
    }

    pub fn len(&self) -> usize {
        self.range_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range_labels.is_empty()
    }

    /// Total number of frames carrying at least one label.
    pub fn labeled_frame_count(&self) -> u64 {
        self.range_labels.iter().map(RangeLabel::frame_count).sum()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    // -----------------------------------------------------------------------
    // Point query
    // -----------------------------------------------------------------------

    /// Labels assigned to `frame_index`; empty when the frame is unannotated.
    ///
    /// O(log n) binary search over interval starts on a cache miss.
    pub fn get_labels_at_frame(&self, frame_index: FrameIndex) -> LabelSet {
        if let Some(labels) = self.cache.borrow_mut().get(frame_index) {
            return labels;
        }

        // Number of intervals starting at or before the frame (bisect_right).
        let upper = self
            .range_labels
            .partition_point(|r| r.start_frame() <= frame_index);
        let labels = match upper.checked_sub(1).map(|i| &self.range_labels[i]) {
            Some(range) if range.end_frame() >= frame_index => range.label_ids().clone(),
            _ => LabelSet::new(),
        };

        self.cache.borrow_mut().insert(frame_index, labels.clone());
        labels
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Assign exactly `label_ids` to `frame_index`; an empty list clears the frame.
    ///
    /// The interval covering the frame (if any) is split around it and the
    /// pieces are renormalized, so neighbours with matching labels merge back.
    pub fn set_labels_at_frame<I, S>(&mut self, frame_index: FrameIndex, label_ids: I) -> FrameRangeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<LabelId>,
    {
        let requested: LabelSet = label_ids.into_iter().map(Into::into).collect();
        if self.get_labels_at_frame(frame_index) == requested {
            return Ok(());
        }

        self.cache.get_mut().invalidate(frame_index);

        let covering: Vec<usize> = self
            .range_labels
            .iter()
            .enumerate()
            .filter(|(_, r)| r.contains(frame_index))
            .map(|(i, _)| i)
            .collect();
        if covering.len() > 1 {
            return Err(FrameRangeError::Invariant(format!(
                "frame {frame_index} of video {} is covered by {} intervals",
                self.video_id,
                covering.len()
            )));
        }

        let mut pieces = Vec::with_capacity(3);
        if !requested.is_empty() {
            pieces.push(RangeLabel::new(frame_index, frame_index, requested)?);
        }

        match covering.first() {
            None if pieces.is_empty() => return Ok(()),
            None => {}
            Some(&index) => {
                let old = &self.range_labels[index];
                if frame_index > old.start_frame() {
                    pieces.push(RangeLabel::new(
                        old.start_frame(),
                        frame_index - 1,
                        old.label_ids().iter().cloned(),
                    )?);
                }
                if old.end_frame() > frame_index {
                    pieces.push(RangeLabel::new(
                        frame_index + 1,
                        old.end_frame(),
                        old.label_ids().iter().cloned(),
                    )?);
                }
                self.range_labels.remove(index);
            }
        }

        debug!(
            video_id = %self.video_id,
            frame_index,
            split = !covering.is_empty(),
            "set labels at frame"
        );
        self.range_labels.extend(pieces);
        self.range_labels = normalize(&self.range_labels);
        Ok(())
    }

    /// Overwrite the closed range `[start_frame, end_frame]` with `label_ids`
    /// (an empty list clears it). Existing intervals are trimmed to the parts
    /// outside the range, so later range writes win over earlier annotations.
    pub fn set_labels_in_range<I, S>(
        &mut self,
        start_frame: FrameIndex,
        end_frame: FrameIndex,
        label_ids: I,
    ) -> FrameRangeResult<()>
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

        let requested: LabelSet = label_ids.into_iter().map(Into::into).collect();
        let mut next = Vec::with_capacity(self.range_labels.len() + 2);
        if !requested.is_empty() {
            next.push(RangeLabel::new(start_frame, end_frame, requested)?);
        }
        for range in &self.range_labels {
            if range.end_frame() < start_frame || range.start_frame() > end_frame {
                next.push(range.clone());
                continue;
            }
            if range.start_frame() < start_frame {
                next.push(RangeLabel::new(
                    range.start_frame(),
                    start_frame - 1,
                    range.label_ids().iter().cloned(),
                )?);
            }
            if range.end_frame() > end_frame {
                next.push(RangeLabel::new(
                    end_frame + 1,
                    range.end_frame(),
                    range.label_ids().iter().cloned(),
                )?);
            }
        }

        debug!(
            video_id = %self.video_id,
            start_frame,
            end_frame,
            "set labels in range"
        );
        self.range_labels = normalize(&next);
        self.cache.get_mut().clear();
        Ok(())
    }

    /// Replace every interval with `range_labels` (normalized first).
    pub fn replace_range_labels(&mut self, range_labels: Vec<RangeLabel>) {
        self.range_labels = normalize(&range_labels);
        self.cache.get_mut().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
