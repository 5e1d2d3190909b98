//! PyO3 bindings exposed as the `_framerange_core` extension module.
//!
//! Python sees frames as signed ints; they are validated before crossing
//! into the unsigned `FrameIndex` domain.

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::config::EngineConfig;
use crate::errors::FrameRangeError;
use crate::models::{frame_from_signed, FrameLabels, RangeLabel, VideoAnnotationRangeDocument};
use crate::ops::apply::{ApplyMode, ApplySummary, RangeAnnotationPayload};
use crate::ops::guards::MAX_SKIP_FRAME;
use crate::ops::service::RangeAnnotationService;
use crate::range::{self, VideoAnnotationRange, DEFAULT_LOOKUP_CACHE_CAPACITY};

type PyRangeTuple = (i64, i64, Vec<String>);
type PySummary = (usize, usize, u64);

fn to_tuple(range: &RangeLabel) -> PyRangeTuple {
    (
        range.start_frame() as i64,
        range.end_frame() as i64,
        range.label_ids().iter().cloned().collect(),
    )
}

fn from_tuples(ranges: Vec<PyRangeTuple>) -> Result<Vec<RangeLabel>, FrameRangeError> {
    ranges
        .into_iter()
        .map(|(start, end, labels)| RangeLabel::from_signed(start, end, labels))
        .collect()
}

fn summary_tuple(summary: ApplySummary) -> PySummary {
    (
        summary.intervals_before,
        summary.intervals_after,
        summary.labeled_frames,
    )
}

fn parse_mode(mode: &str) -> Result<ApplyMode, FrameRangeError> {
    match mode {
        "replace" => Ok(ApplyMode::Replace),
        "overwrite" => Ok(ApplyMode::Overwrite),
        other => Err(FrameRangeError::Validation(format!(
            "unknown apply mode {other:?}, expected \"replace\" or \"overwrite\""
        ))),
    }
}

// ---------------------------------------------------------------------------
// VideoAnnotationRange
// ---------------------------------------------------------------------------

#[pyclass(name = "VideoAnnotationRange", unsendable)]
pub struct PyVideoAnnotationRange {
    inner: VideoAnnotationRange,
}

#[pymethods]
impl PyVideoAnnotationRange {
    #[new]
    #[pyo3(signature = (video_id, range_labels=Vec::new(), cache_capacity=DEFAULT_LOOKUP_CACHE_CAPACITY))]
    fn new(
        video_id: String,
        range_labels: Vec<PyRangeTuple>,
        cache_capacity: usize,
    ) -> PyResult<Self> {
        let ranges = from_tuples(range_labels)?;
        Ok(Self {
            inner: VideoAnnotationRange::with_capacity(video_id, ranges, cache_capacity),
        })
    }

    #[staticmethod]
    #[pyo3(signature = (document, cache_capacity=DEFAULT_LOOKUP_CACHE_CAPACITY))]
    fn from_json(document: &str, cache_capacity: usize) -> PyResult<Self> {
        let doc: VideoAnnotationRangeDocument =
            serde_json::from_str(document).map_err(FrameRangeError::from)?;
        Ok(Self {
            inner: VideoAnnotationRange::from_document(doc, cache_capacity),
        })
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(serde_json::to_string(&self.inner.to_document()).map_err(FrameRangeError::from)?)
    }

    #[getter]
    fn id(&self) -> &str {
        self.inner.id()
    }

    #[getter]
    fn video_id(&self) -> &str {
        self.inner.video_id()
    }

    #[getter]
    fn range_labels(&self) -> Vec<PyRangeTuple> {
        self.inner.range_labels().iter().map(to_tuple).collect()
    }

    fn get_labels_at_frame(&self, frame_index: i64) -> PyResult<Vec<String>> {
        let frame = frame_from_signed("frame_index", frame_index)?;
        Ok(self.inner.get_labels_at_frame(frame).into_iter().collect())
    }

    fn set_labels_at_frame(&mut self, frame_index: i64, label_ids: Vec<String>) -> PyResult<()> {
        let frame = frame_from_signed("frame_index", frame_index)?;
        self.inner.set_labels_at_frame(frame, label_ids)?;
        Ok(())
    }

    fn set_labels_in_range(
        &mut self,
        start_frame: i64,
        end_frame: i64,
        label_ids: Vec<String>,
    ) -> PyResult<()> {
        let start = frame_from_signed("start_frame", start_frame)?;
        let end = frame_from_signed("end_frame", end_frame)?;
        self.inner.set_labels_in_range(start, end, label_ids)?;
        Ok(())
    }

    fn labeled_frame_count(&self) -> u64 {
        self.inner.labeled_frame_count()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "VideoAnnotationRange(video_id={:?}, intervals={})",
            self.inner.video_id(),
            self.inner.len()
        )
    }
}

// ---------------------------------------------------------------------------
// RangeStore
// ---------------------------------------------------------------------------

#[pyclass(name = "RangeStore")]
pub struct PyRangeStore {
    service: RangeAnnotationService,
}

#[pymethods]
impl PyRangeStore {
    /// Open the store at `db_path`, or at the `FRAMERANGE_*` environment
    /// defaults when no path is given.
    #[new]
    #[pyo3(signature = (db_path=None))]
    fn new(db_path: Option<String>) -> PyResult<Self> {
        let mut config = EngineConfig::from_env()?;
        if let Some(path) = db_path {
            config.db_path = path.into();
        }
        Ok(Self {
            service: RangeAnnotationService::open(config)?,
        })
    }

    #[getter]
    fn db_path(&self) -> String {
        self.service.database().db_path().display().to_string()
    }

    fn get_range_annotation(&self, py: Python<'_>, video_id: &str) -> PyResult<Vec<PyRangeTuple>> {
        let ranges = py.allow_threads(|| self.service.get_range_annotation(video_id))?;
        Ok(ranges.iter().map(to_tuple).collect())
    }

    fn get_labels_at_frame(
        &self,
        py: Python<'_>,
        video_id: &str,
        frame_index: i64,
    ) -> PyResult<Vec<String>> {
        let frame = frame_from_signed("frame_index", frame_index)?;
        let labels = py.allow_threads(|| self.service.get_labels_at_frame(video_id, frame))?;
        Ok(labels.into_iter().collect())
    }

    /// Post explicit ranges; `mode` is `"replace"` or `"overwrite"`.
    #[pyo3(signature = (video_id, range_labels, mode="replace"))]
    fn post_range_annotation(
        &self,
        py: Python<'_>,
        video_id: &str,
        range_labels: Vec<PyRangeTuple>,
        mode: &str,
    ) -> PyResult<PySummary> {
        let mode = parse_mode(mode)?;
        let payload = RangeAnnotationPayload::Ranges {
            range_labels: from_tuples(range_labels)?,
        };
        let summary = py.allow_threads(|| {
            self.service
                .post_range_annotation(video_id, &payload, None, mode)
        })?;
        Ok(summary_tuple(summary))
    }

    /// Post sampled `(frame_index, label_ids)` pairs expanded by `skip_frame`.
    #[pyo3(signature = (video_id, frames, skip_frame=None, frame_count=None, mode="replace"))]
    fn post_sampled_frames(
        &self,
        py: Python<'_>,
        video_id: &str,
        frames: Vec<(i64, Vec<String>)>,
        skip_frame: Option<i64>,
        frame_count: Option<i64>,
        mode: &str,
    ) -> PyResult<PySummary> {
        let mode = parse_mode(mode)?;
        let frames = frames
            .into_iter()
            .map(|(frame, labels)| {
                Ok(FrameLabels::new(frame_from_signed("frame_index", frame)?, labels))
            })
            .collect::<Result<Vec<_>, FrameRangeError>>()?;
        let skip_frame = skip_frame
            .map(|v| frame_from_signed("skip_frame", v))
            .transpose()?;
        let frame_count = frame_count
            .map(|v| frame_from_signed("frame_count", v))
            .transpose()?;
        let payload = RangeAnnotationPayload::Frames {
            frames,
            frame_count,
        };
        let summary = py.allow_threads(|| {
            self.service
                .post_range_annotation(video_id, &payload, skip_frame, mode)
        })?;
        Ok(summary_tuple(summary))
    }

    fn post_frame_annotation(
        &self,
        py: Python<'_>,
        video_id: &str,
        frame_index: i64,
        label_ids: Vec<String>,
    ) -> PyResult<PySummary> {
        let frame = frame_from_signed("frame_index", frame_index)?;
        let summary = py.allow_threads(|| {
            self.service
                .post_frame_annotation(video_id, frame, label_ids)
        })?;
        Ok(summary_tuple(summary))
    }

    fn delete_range_annotation(&self, py: Python<'_>, video_id: &str) -> PyResult<()> {
        py.allow_threads(|| self.service.delete_range_annotation(video_id))?;
        Ok(())
    }

    fn list_video_ids(&self, py: Python<'_>) -> PyResult<Vec<String>> {
        Ok(py.allow_threads(|| self.service.database().list_video_ids())?)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Normalize `(start, end, labels)` tuples into non-overlapping intervals.
#[pyfunction]
fn normalize_ranges(range_labels: Vec<PyRangeTuple>) -> PyResult<Vec<PyRangeTuple>> {
    let ranges = from_tuples(range_labels)?;
    Ok(range::normalize(&ranges).iter().map(to_tuple).collect())
}

#[pyfunction]
#[pyo3(name = "range_id_from_video_id")]
fn py_range_id_from_video_id(video_id: &str) -> String {
    crate::models::range_id_from_video_id(video_id)
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyVideoAnnotationRange>()?;
    m.add_class::<PyRangeStore>()?;

    m.add("DEFAULT_LOOKUP_CACHE_CAPACITY", DEFAULT_LOOKUP_CACHE_CAPACITY)?;
    m.add("MAX_SKIP_FRAME", MAX_SKIP_FRAME)?;

    m.add_function(wrap_pyfunction!(normalize_ranges, m)?)?;
    m.add_function(wrap_pyfunction!(py_range_id_from_video_id, m)?)?;
    Ok(())
}
