use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing to or rotating a log file.
#[derive(Error, Debug)]
pub enum WriterError {
    /// Construction parameters are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to open or create the active file
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the size of a freshly opened active file
    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to append to the active file after `written` bytes of the
    /// payload had already landed
    #[error("failed to write to {} after {written} bytes: {source}", .path.display())]
    Write {
        path: PathBuf,
        written: usize,
        #[source]
        source: std::io::Error,
    },

    /// The payload was appended in full but the rotation it triggered failed
    #[error("wrote {written} bytes, then rotation failed: {source}")]
    Rotate {
        written: usize,
        #[source]
        source: Box<WriterError>,
    },

    /// Failed to flush the active file to stable storage
    #[error("failed to sync {}: {source}", .path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to list the generation files next to the active file
    #[error("failed to discover generations in {}: {source}", .dir.display())]
    Discover {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a generation beyond the retention count
    #[error("failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to rename a generation or the active file
    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriterError {
    /// The I/O error underneath this failure, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            WriterError::InvalidConfig(_) => None,
            WriterError::Rotate { source, .. } => source.io_error(),
            WriterError::Open { source, .. }
            | WriterError::Stat { source, .. }
            | WriterError::Write { source, .. }
            | WriterError::Sync { source, .. }
            | WriterError::Discover { source, .. }
            | WriterError::Remove { source, .. }
            | WriterError::Rename { source, .. } => Some(source),
        }
    }

    /// Number of payload bytes that reached the active file before the
    /// failure.
    pub fn bytes_written(&self) -> usize {
        match self {
            WriterError::Write { written, .. } | WriterError::Rotate { written, .. } => *written,
            _ => 0,
        }
    }
}

impl From<WriterError> for std::io::Error {
    fn from(err: WriterError) -> Self {
        // `Interrupted` tells `write_all` to retry the same payload.
        let kind = match err.io_error().map(std::io::Error::kind) {
            None => std::io::ErrorKind::InvalidInput,
            Some(std::io::ErrorKind::Interrupted) => std::io::ErrorKind::Other,
            Some(kind) => kind,
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, WriterError>;
