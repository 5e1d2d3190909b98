//! Engine configuration resolved from the environment.

use std::path::PathBuf;

use crate::errors::{FrameRangeError, FrameRangeResult};
use crate::ops::guards::{clamp_cache_capacity, clamp_skip_frame, DEFAULT_SKIP_FRAME};
use crate::range::DEFAULT_LOOKUP_CACHE_CAPACITY;

pub const ENV_LOOKUP_CACHE: &str = "FRAMERANGE_LOOKUP_CACHE";
pub const ENV_SKIP_FRAME: &str = "FRAMERANGE_SKIP_FRAME";
pub const ENV_DB_PATH: &str = "FRAMERANGE_DB_PATH";

pub const DEFAULT_DB_PATH: &str = "~/.framerange/ranges.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Frame lookups remembered per loaded range.
    pub lookup_cache_capacity: usize,
    /// Stride applied to sampled frame posts that do not name one.
    pub default_skip_frame: u64,
    pub db_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_cache_capacity: DEFAULT_LOOKUP_CACHE_CAPACITY,
            default_skip_frame: DEFAULT_SKIP_FRAME,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

fn parse_positive(name: &str, raw: &str) -> FrameRangeResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(FrameRangeError::Config(format!(
            "{name} must be a positive integer, got {raw:?}"
        ))),
        Ok(v) => Ok(v),
    }
}

impl EngineConfig {
    /// Read overrides from `FRAMERANGE_*` environment variables.
    pub fn from_env() -> FrameRangeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset or blank keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> FrameRangeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_LOOKUP_CACHE) {
            let value = parse_positive(ENV_LOOKUP_CACHE, &raw)?;
            config.lookup_cache_capacity =
                clamp_cache_capacity(usize::try_from(value).unwrap_or(usize::MAX));
        }
        if let Some(raw) = get(ENV_SKIP_FRAME) {
            config.default_skip_frame = clamp_skip_frame(parse_positive(ENV_SKIP_FRAME, &raw)?);
        }
        if let Some(raw) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(raw.trim());
        }
        Ok(config)
    }
}
