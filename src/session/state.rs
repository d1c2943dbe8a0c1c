use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorKind, StreamError};
use crate::pyramid::PyramidDescriptor;
use crate::tile::PyramidTileSource;

/// Monotonically increasing identifier of a streaming session.
///
/// Every selection starts a new session; completions carrying an older id are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why an overview image is displayed instead of streamed tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverviewReason {
    /// The caller asked for the whole-image mode
    Requested,

    /// Tile streaming could not be attached; this is reduced functionality
    Fallback { cause: String },
}

/// Observable state of the session controller.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No image selected
    Idle,

    /// Waiting for the pyramid descriptor
    DescriptorLoading { session: SessionId, image_id: String },

    /// Descriptor loaded; the surface is opening the tile source
    Attaching {
        session: SessionId,
        image_id: String,
        descriptor: Arc<PyramidDescriptor>,
    },

    /// The surface is streaming tiles through the source
    Streaming {
        session: SessionId,
        source: Arc<PyramidTileSource>,
    },

    /// A single overview image is displayed
    Overview {
        session: SessionId,
        image_id: String,
        url: String,
        reason: OverviewReason,
    },

    /// The session failed; a new selection recovers
    Error {
        session: SessionId,
        image_id: String,
        kind: ErrorKind,
        message: String,
    },
}

impl SessionState {
    /// Short name of the state, for logging and display.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::DescriptorLoading { .. } => "DescriptorLoading",
            SessionState::Attaching { .. } => "Attaching",
            SessionState::Streaming { .. } => "Streaming",
            SessionState::Overview { .. } => "Overview",
            SessionState::Error { .. } => "Error",
        }
    }

    /// Session the state belongs to (`None` when idle).
    pub fn session(&self) -> Option<SessionId> {
        match self {
            SessionState::Idle => None,
            SessionState::DescriptorLoading { session, .. }
            | SessionState::Attaching { session, .. }
            | SessionState::Streaming { session, .. }
            | SessionState::Overview { session, .. }
            | SessionState::Error { session, .. } => Some(*session),
        }
    }

    /// Selected image (`None` when idle).
    pub fn image_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::DescriptorLoading { image_id, .. }
            | SessionState::Attaching { image_id, .. }
            | SessionState::Overview { image_id, .. }
            | SessionState::Error { image_id, .. } => Some(image_id),
            SessionState::Streaming { source, .. } => Some(source.image_id()),
        }
    }

    /// Error classification when in the `Error` state.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SessionState::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether something is displayed but with reduced functionality.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            SessionState::Overview {
                reason: OverviewReason::Fallback { .. },
                ..
            }
        )
    }

    /// Whether the surface shows content for the selected image.
    pub fn is_displaying(&self) -> bool {
        matches!(
            self,
            SessionState::Streaming { .. } | SessionState::Overview { .. }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Error { kind, message, .. } => write!(f, "Error({kind}): {message}"),
            SessionState::Overview {
                reason: OverviewReason::Fallback { cause },
                ..
            } => write!(f, "Overview (fallback: {cause})"),
            other => match other.image_id() {
                Some(image_id) => write!(f, "{} '{}'", other.name(), image_id),
                None => f.write_str(other.name()),
            },
        }
    }
}

/// Result of one `select` call, from the caller's point of view.
#[derive(Debug)]
pub enum SelectOutcome {
    /// Tiles are streaming through this source
    Streaming(Arc<PyramidTileSource>),

    /// The overview was displayed as requested
    Overview { url: String },

    /// Tile streaming failed to attach; the overview is displayed instead
    Degraded { url: String, error: StreamError },

    /// The session ended in the `Error` state
    Failed(StreamError),

    /// A newer selection replaced this one before it completed
    Superseded,
}

impl SelectOutcome {
    /// The error behind a failed or degraded outcome.
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            SelectOutcome::Degraded { error, .. } | SelectOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, SelectOutcome::Superseded)
    }
}
