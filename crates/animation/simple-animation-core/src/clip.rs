//! Host-facing seams: clips, pose evaluation and clip resolution.
//!
//! The engine never looks inside a clip or a pose. Hosts (or the bundled
//! [`crate::skeletal`] evaluator) implement these traits and the engine drives
//! them once per tick.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shared, immutable clip handle. Two handles refer to the same clip iff
/// `Arc::ptr_eq` holds.
pub type ClipRef<C> = Arc<C>;

/// Policy for time progression past the end of a clip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Defer to the next level (state -> clip -> component); `Once` if nothing is set.
    #[default]
    Default,
    /// Play to the end and stop there; the state is then finished.
    Once,
    /// Wrap time modulo the clip length.
    Loop,
    /// Reflect time at both ends.
    PingPong,
    /// Hold the edge frame forever without finishing.
    ClampForever,
}

impl WrapMode {
    /// Return `self` unless it is `Default`, in which case `fallback` is used.
    #[inline]
    pub fn or(self, fallback: WrapMode) -> WrapMode {
        match self {
            WrapMode::Default => fallback,
            other => other,
        }
    }

    /// Resolve a chain of wrap modes to a concrete one.
    #[inline]
    pub fn resolve(state: WrapMode, clip: WrapMode, component: WrapMode) -> WrapMode {
        state.or(clip).or(component).or(WrapMode::Once)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Once => "once",
            Self::Loop => "loop",
            Self::PingPong => "ping_pong",
            Self::ClampForever => "clamp_forever",
        }
    }
}

impl From<&str> for WrapMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "once" => Self::Once,
            "loop" => Self::Loop,
            "ping_pong" | "pingpong" => Self::PingPong,
            "clamp_forever" | "clampforever" => Self::ClampForever,
            _ => Self::Default,
        }
    }
}

/// An immutable source of time-parameterized pose data.
pub trait Clip: fmt::Debug {
    /// Display name; also the reference written into persisted snapshots.
    fn name(&self) -> &str;

    /// Length in seconds. Zero-length clips sample at normalized time 0.
    fn length(&self) -> f32;

    /// Wrap mode authored on the clip itself.
    fn wrap_mode(&self) -> WrapMode {
        WrapMode::Default
    }

    /// Legacy-format clips cannot drive this component.
    fn is_legacy_format(&self) -> bool {
        false
    }
}

/// Pose evaluation and combination primitives supplied by the host.
pub trait PoseEvaluator {
    type Clip: Clip;
    type Pose: Clone;

    /// Sample `clip` at `normalized_time` in [0, 1].
    fn evaluate(&mut self, clip: &Self::Clip, normalized_time: f32) -> Self::Pose;

    /// Combine weighted poses. Weights are each in [0, 1]; their sum is not normalized.
    fn mix(&mut self, weighted: &[(Self::Pose, f32)]) -> Self::Pose;

    /// Pose produced when nothing contributes.
    fn bind_pose(&mut self) -> Self::Pose;
}

/// Trait for resolving persisted clip references back to clip handles.
/// Serialization layers implement this and pass it into `restore_snapshot`.
pub trait ClipResolver<C> {
    fn resolve(&mut self, clip_ref: &str) -> Option<ClipRef<C>>;
}

impl<C, F> ClipResolver<C> for F
where
    F: FnMut(&str) -> Option<ClipRef<C>>,
{
    fn resolve(&mut self, clip_ref: &str) -> Option<ClipRef<C>> {
        self(clip_ref)
    }
}
