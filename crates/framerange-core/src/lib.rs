//! framerange core library: normalized per-frame label ranges for videos.
//!
//! The core keeps each video's frame annotations as a compact list of
//! non-overlapping labeled intervals, answers point lookups with a binary
//! search plus a small LRU cache, and applies point and range updates while
//! keeping the list normalized. A SQLite document store and a service facade
//! sit on top. With the `python` feature the crate also builds the
//! `_framerange_core` extension module via PyO3.

pub mod config;
pub mod errors;
pub mod models;
pub mod ops;
pub mod range;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use errors::{FrameRangeError, FrameRangeResult};
pub use models::{FrameIndex, LabelId, LabelSet, RangeLabel};
pub use range::VideoAnnotationRange;

// ---------------------------------------------------------------------------
// Top-level Python module: _framerange_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _framerange_core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)
}
