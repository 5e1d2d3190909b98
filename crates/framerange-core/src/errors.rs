//! Error types for the framerange core library.

/// Top-level error enum for the framerange core library.
#[derive(Debug, thiserror::Error)]
pub enum FrameRangeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<FrameRangeError> for pyo3::PyErr {
    fn from(err: FrameRangeError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};

        match &err {
            FrameRangeError::Validation(_)
            | FrameRangeError::Invariant(_)
            | FrameRangeError::Json(_)
            | FrameRangeError::Config(_) => PyValueError::new_err(err.to_string()),
            FrameRangeError::NotFound(_) => PyKeyError::new_err(err.to_string()),
            FrameRangeError::Database(_) | FrameRangeError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            FrameRangeError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type FrameRangeResult<T> = Result<T, FrameRangeError>;
