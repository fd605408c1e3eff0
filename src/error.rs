use thiserror::Error;

/// Errors surfaced by the archive writer.
///
/// Sink failures are fatal and propagate unchanged; the writer performs no
/// retries. Retry policy, if any, belongs to the sink.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The entry size does not fit the 11-digit octal ustar size field.
    #[error("entry '{path}' is {size} bytes, too large for the ustar size field")]
    UnsupportedSize { path: String, size: u64 },

    /// Strict mode only: the streamed byte count differs from the size
    /// declared when the entry was opened.
    #[error("entry '{path}' declared {declared} bytes but {written} were streamed")]
    SizeMismatch {
        path: String,
        declared: u64,
        written: u64,
    },

    /// Failure writing to the sink or reading from a content source.
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
