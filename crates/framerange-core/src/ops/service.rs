//! Transport-agnostic facade for the range annotation endpoints.
//!
//! Maps `GET range_annotation`, `POST range_annotation?skip_frame=N` and
//! `POST frames/{frame_index}/annotations` onto the store and the range
//! engine. Every read and write holds the video's lock; writes keep it across
//! load, mutate and save.
//!
//! Recently used ranges stay loaded, each with its own frame lookup cache,
//! so repeated point queries on a video skip the store. The service assumes
//! it is the only writer of its database.

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::models::{FrameIndex, LabelId, LabelSet, RangeLabel};
use crate::ops::apply::{
    apply_frame_labels, apply_range_labels, resolve_payload, ApplyMode, ApplySummary,
    RangeAnnotationPayload,
};
use crate::ops::guards::{clamp_skip_frame, MAX_LOADED_RANGES};
use crate::range::{CacheStats, VideoAnnotationRange};
use crate::store::database::Database;
use crate::store::locks::VideoLocks;

pub struct RangeAnnotationService {
    db: Database,
    locks: VideoLocks,
    /// Loaded ranges in access order; the front is least recently used.
    /// A range is taken out while its video's lock is held and put back
    /// once it matches the store again.
    loaded: Mutex<IndexMap<String, VideoAnnotationRange>>,
    config: EngineConfig,
}

impl RangeAnnotationService {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            db: db.with_cache_capacity(config.lookup_cache_capacity),
            locks: VideoLocks::new(),
            loaded: Mutex::new(IndexMap::new()),
            config,
        }
    }

    /// Open (and migrate) the store at `config.db_path`.
    pub fn open(config: EngineConfig) -> FrameRangeResult<Self> {
        let db = Database::new(&config.db_path)?;
        db.init_schema()?;
        Ok(Self::new(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lookup-cache counters of a loaded video, `None` when it is not loaded.
    pub fn cache_stats(&self, video_id: &str) -> Option<CacheStats> {
        self.loaded.lock().get(video_id).map(VideoAnnotationRange::cache_stats)
    }

    /// Number of ranges currently held in memory.
    pub fn loaded_len(&self) -> usize {
        self.loaded.lock().len()
    }

    /// Number of per-video locks currently registered.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // -----------------------------------------------------------------------
    // Loaded ranges (callers hold the video's lock)
    // -----------------------------------------------------------------------

    fn checkout(&self, video_id: &str) -> FrameRangeResult<Option<VideoAnnotationRange>> {
        if let Some(range) = self.loaded.lock().shift_remove(video_id) {
            return Ok(Some(range));
        }
        self.db.load(video_id)
    }

    fn checkin(&self, range: VideoAnnotationRange) {
        let mut loaded = self.loaded.lock();
        loaded.insert(range.video_id().to_string(), range);
        while loaded.len() > MAX_LOADED_RANGES {
            loaded.shift_remove_index(0);
        }
    }

    fn read<T>(
        &self,
        video_id: &str,
        f: impl FnOnce(&VideoAnnotationRange) -> T,
    ) -> FrameRangeResult<Option<T>> {
        self.locks.with_lock(video_id, || {
            let Some(range) = self.checkout(video_id)? else {
                return Ok(None);
            };
            let out = f(&range);
            self.checkin(range);
            Ok(Some(out))
        })
    }

    /// Load (or start) the range, apply `f` and save it. A range that was
    /// never stored and is still empty afterwards is not written.
    ///
    /// On failure the in-memory copy is dropped, so the next access reloads
    /// what the store holds.
    fn modify<T>(
        &self,
        video_id: &str,
        f: impl FnOnce(&mut VideoAnnotationRange) -> FrameRangeResult<T>,
    ) -> FrameRangeResult<T> {
        self.locks.with_lock(video_id, || {
            let (mut range, stored) = match self.checkout(video_id)? {
                Some(range) => (range, true),
                None => (
                    VideoAnnotationRange::with_capacity(
                        video_id,
                        Vec::new(),
                        self.config.lookup_cache_capacity,
                    ),
                    false,
                ),
            };
            let out = f(&mut range)?;
            if !stored && range.is_empty() {
                debug!(video_id, "nothing to store for unannotated video");
                return Ok(out);
            }
            self.db.save(&range)?;
            self.checkin(range);
            Ok(out)
        })
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Current range labels of `video_id`; empty when nothing is stored.
    pub fn get_range_annotation(&self, video_id: &str) -> FrameRangeResult<Vec<RangeLabel>> {
        Ok(self
            .read(video_id, |range| range.range_labels().to_vec())?
            .unwrap_or_default())
    }

    pub fn get_labels_at_frame(
        &self,
        video_id: &str,
        frame_index: FrameIndex,
    ) -> FrameRangeResult<LabelSet> {
        Ok(self
            .read(video_id, |range| range.get_labels_at_frame(frame_index))?
            .unwrap_or_default())
    }

    /// Apply a posted set of ranges (or sampled frames) to `video_id`.
    ///
    /// `skip_frame` falls back to the configured default and is clamped.
    pub fn post_range_annotation(
        &self,
        video_id: &str,
        payload: &RangeAnnotationPayload,
        skip_frame: Option<u64>,
        mode: ApplyMode,
    ) -> FrameRangeResult<ApplySummary> {
        let skip_frame = clamp_skip_frame(skip_frame.unwrap_or(self.config.default_skip_frame));
        let post = resolve_payload(payload, skip_frame)?;
        let posted = post.range_labels.len();
        let cleared = post.cleared.len();

        let summary = self.modify(video_id, |range| apply_range_labels(range, post, mode))?;
        info!(
            video_id,
            posted,
            cleared,
            skip_frame,
            ?mode,
            intervals = summary.intervals_after,
            "applied range annotation"
        );
        Ok(summary)
    }

    /// Set the labels of a single frame; an empty list clears it.
    pub fn post_frame_annotation(
        &self,
        video_id: &str,
        frame_index: FrameIndex,
        label_ids: Vec<LabelId>,
    ) -> FrameRangeResult<ApplySummary> {
        self.modify(video_id, |range| {
            apply_frame_labels(range, frame_index, label_ids)
        })
    }

    pub fn delete_range_annotation(&self, video_id: &str) -> FrameRangeResult<()> {
        let removed = self.locks.with_lock(video_id, || {
            self.loaded.lock().shift_remove(video_id);
            self.db.delete(video_id)
        })?;
        self.locks.prune();
        if !removed {
            return Err(FrameRangeError::NotFound(format!(
                "no range annotation stored for video {video_id}"
            )));
        }
        Ok(())
    }
}
