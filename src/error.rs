use std::sync::Arc;

pub type ScrollFrameResult<T> = Result<T, ScrollFrameError>;

/// Shared, cloneable cause of a frame load failure.
pub type LoadCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while building, loading or drawing a sequence.
///
/// The enum is `Clone` so the same value can be handed to `error` listeners
/// and returned to the caller of `init()`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScrollFrameError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to resolve source for frame {index}: {reason}")]
    Resolution { index: usize, reason: String },

    #[error("failed to load frame {index}: {source}")]
    Load {
        index: usize,
        #[source]
        source: LoadCause,
    },

    #[error("frame {index} and every later frame are unavailable")]
    FrameUnavailable { index: usize },

    #[error("frame {index} was not prerendered or has been pruned")]
    NotPrerendered { index: usize },

    #[error("initialization is already in progress")]
    AlreadyLoading,

    #[error("instance has been destroyed")]
    Destroyed,
}

impl ScrollFrameError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resolution(index: usize, reason: impl Into<String>) -> Self {
        Self::Resolution {
            index,
            reason: reason.into(),
        }
    }

    /// Wrap a decode/fetch failure, keeping the `anyhow` chain as the source.
    pub fn load(index: usize, err: anyhow::Error) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
        Self::Load {
            index,
            source: Arc::from(boxed),
        }
    }

    /// Frame the failure is tagged with, if any.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::Resolution { index, .. }
            | Self::Load { index, .. }
            | Self::FrameUnavailable { index }
            | Self::NotPrerendered { index } => Some(*index),
            Self::Config(_) | Self::AlreadyLoading | Self::Destroyed => None,
        }
    }

    /// Render failures are reported but never stop playback.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            Self::FrameUnavailable { .. } | Self::NotPrerendered { .. }
        )
    }
}
