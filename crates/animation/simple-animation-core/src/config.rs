//! Component configuration.

use serde::{Deserialize, Serialize};

use crate::clip::WrapMode;

/// Shape of the weight ramp used by crossfades and blends.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeCurve {
    #[default]
    Linear,
    /// Smoothstep; still monotonic, so paired ramps keep summing to one.
    EaseInOut,
}

impl FadeCurve {
    /// Map linear progress `p` in [0, 1] onto the curve.
    #[inline]
    pub fn apply(self, p: f32) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => p,
            FadeCurve::EaseInOut => p * p * (3.0 - 2.0 * p),
        }
    }
}

/// Configuration for an animation component.
/// Every field has a default so partial JSON documents deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Start the default clip on activation and from `play()`.
    pub play_automatically: bool,
    /// Component-wide wrap mode used when states and clips leave it at `Default`.
    pub wrap_mode: WrapMode,
    pub fade_curve: FadeCurve,
    /// Weights at or below this are treated as zero when a transition settles.
    pub negligible_weight: f32,
    /// Maximum number of transition requests waiting behind the active one.
    pub max_queued_transitions: usize,
    /// Maximum events retained between ticks before the oldest are dropped.
    pub max_pending_events: usize,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            play_automatically: true,
            wrap_mode: WrapMode::Default,
            fade_curve: FadeCurve::Linear,
            negligible_weight: 1e-3,
            max_queued_transitions: 16,
            max_pending_events: 256,
        }
    }
}
