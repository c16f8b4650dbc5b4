use thiserror::Error;

/// Errors raised while reading, writing or extracting archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem or stream transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container's structural data is unreadable or corrupt.
    #[error("Invalid archive: {0}")]
    Format(String),

    /// Two central directory records share one name.
    #[error("Duplicate {name} in {archive}")]
    DuplicateEntry { name: String, archive: String },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An entry path that is absolute or climbs out of its root.
    #[error("Unsafe entry path: {0}")]
    UnsafePath(String),
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

impl ArchiveError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        ArchiveError::Format(reason.into())
    }
}
