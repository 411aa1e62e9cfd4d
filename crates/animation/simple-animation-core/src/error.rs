//! Error types for the animation component.
//!
//! Only validation problems and persistence failures are errors. Looking up a
//! state that does not exist is an ordinary outcome and is reported through
//! `bool`/`Option` returns instead.

use serde::{Deserialize, Serialize};

/// Error type for animation operations that abort the call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationError {
    /// A legacy-format clip was handed to the component.
    #[error(
        "Legacy clip {clip} cannot be used in this component. Set .legacy property to false before using this clip"
    )]
    LegacyClip { clip: String },

    /// A required clip argument was absent.
    #[error("Missing clip argument: {argument}")]
    MissingClip { argument: String },

    /// Snapshot encoding or decoding failed.
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

impl AnimationError {
    /// Build a legacy clip error for the named clip.
    #[inline]
    pub fn legacy_clip(clip: impl Into<String>) -> Self {
        Self::LegacyClip { clip: clip.into() }
    }

    /// Build a missing clip error for the named argument.
    #[inline]
    pub fn missing_clip(argument: impl Into<String>) -> Self {
        Self::MissingClip {
            argument: argument.into(),
        }
    }

    /// Check if the caller can retry with different input.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SerializationError { .. })
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::LegacyClip { .. } | Self::MissingClip { .. } => "validation",
            Self::SerializationError { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}
