use thiserror::Error;

/// Transport errors that can occur when talking to the slide backend
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The backend answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A configured or derived address is not a valid URL
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors raised by a viewing surface while opening or displaying content
#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    /// I/O error while fetching content for the surface
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The fetched bytes are not a decodable image
    #[error("Undecodable image from {url}: {message}")]
    Decode { url: String, message: String },

    /// The surface refused the content (e.g. a tile larger than advertised)
    #[error("Surface rejected content: {0}")]
    Rejected(String),

    /// A fetch was requested while nothing is open
    #[error("No content is open on the surface")]
    NoContent,
}

/// Errors produced while loading a pyramid and streaming its tiles.
///
/// Loader and mapper errors surface to the session controller, which is the
/// only place that turns them into state.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Network or HTTP failure fetching the descriptor (retryable)
    #[error("Descriptor unavailable for '{image_id}': {source}")]
    DescriptorUnavailable { image_id: String, source: IoError },

    /// Descriptor is missing fields or violates the pyramid invariants
    #[error("Malformed descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    /// Viewer or source level outside `[0, level_count - 1]`
    #[error("Level {level} out of range (level count {level_count})")]
    LevelOutOfRange { level: u32, level_count: u32 },

    /// Column or row outside the tile grid of its level
    #[error("Tile ({column}, {row}) out of range at level {level}: grid is {columns}x{rows}")]
    TileOutOfRange {
        level: u32,
        column: u32,
        row: u32,
        columns: u32,
        rows: u32,
    },

    /// The viewing surface rejected the tile source or failed to initialize
    #[error("Attach failed: {0}")]
    AttachFailed(#[from] SurfaceError),
}

impl StreamError {
    /// Create a malformed descriptor error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        StreamError::MalformedDescriptor {
            reason: reason.into(),
        }
    }

    /// The state-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::DescriptorUnavailable { .. } => ErrorKind::DescriptorUnavailable,
            StreamError::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            StreamError::LevelOutOfRange { .. } | StreamError::TileOutOfRange { .. } => {
                ErrorKind::LevelOutOfRange
            }
            StreamError::AttachFailed(_) => ErrorKind::AttachFailed,
        }
    }

    /// Whether selecting the same image again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::DescriptorUnavailable { .. })
    }
}

/// Error classification exposed through the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DescriptorUnavailable,
    MalformedDescriptor,
    LevelOutOfRange,
    AttachFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DescriptorUnavailable => "descriptor_unavailable",
            ErrorKind::MalformedDescriptor => "malformed_descriptor",
            ErrorKind::LevelOutOfRange => "level_out_of_range",
            ErrorKind::AttachFailed => "attach_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
