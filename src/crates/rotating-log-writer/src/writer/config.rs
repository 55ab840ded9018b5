use crate::{Result, WriterError};
use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

/// Controls when the active file rotates and how many rotated files are kept.
///
/// The active file rotates once its size reaches `max_size`. Rotated files are
/// numbered `path.0` (newest) upwards; at most `keep_generations` of them stay
/// on disk. The active file itself is not counted against that limit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Rotation threshold (accepts human-readable sizes like "100MB", "512KiB")
    pub max_size: ByteSize,
    /// Maximum number of rotated files to keep
    pub keep_generations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: ByteSize::mb(100),
            keep_generations: 10,
        }
    }
}

impl Config {
    /// Creates a new writer configuration.
    pub fn new(max_size: u64, keep_generations: usize) -> Self {
        Self {
            max_size: ByteSize::b(max_size),
            keep_generations,
        }
    }

    /// Specifies the rotation threshold in bytes.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = ByteSize::b(max_size);
        self
    }

    /// Specifies the maximum number of rotated files.
    pub fn with_keep_generations(mut self, keep_generations: usize) -> Self {
        self.keep_generations = keep_generations;
        self
    }

    /// Rotation threshold in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size.as_u64()
    }

    /// Checks that both limits are positive.
    pub fn validate(&self) -> Result<()> {
        if self.max_size.as_u64() == 0 {
            return Err(WriterError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }

        if self.keep_generations == 0 {
            return Err(WriterError::InvalidConfig(
                "keep_generations must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
