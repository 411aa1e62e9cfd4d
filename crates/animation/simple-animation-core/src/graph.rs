//! Layer mixer and graph run state.
//!
//! Within one tick every enabled state advances before any is sampled, and
//! every sample is taken before mixing, so the mixed pose reflects a single
//! time snapshot.

use serde::{Deserialize, Serialize};

use crate::clip::{PoseEvaluator, WrapMode};
use crate::registry::ClipRegistry;
use crate::state::StateTable;

/// Whether the graph has been built and whether ticks are being evaluated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRunState {
    pub is_initialized: bool,
    pub is_playing: bool,
}

impl GraphRunState {
    /// Resume evaluation. Returns true if it was suspended.
    #[inline]
    pub fn kick(&mut self) -> bool {
        if self.is_playing {
            return false;
        }
        self.is_playing = true;
        log::debug!("animation graph kicked");
        true
    }

    /// Suspend evaluation. Returns true if it was running.
    #[inline]
    pub fn suspend(&mut self) -> bool {
        let was_playing = self.is_playing;
        self.is_playing = false;
        was_playing
    }
}

/// Samples enabled states and combines them into one pose.
#[derive(Debug)]
pub struct LayerMixer<P> {
    weighted: Vec<(P, f32)>,
}

impl<P> Default for LayerMixer<P> {
    fn default() -> Self {
        Self {
            weighted: Vec::new(),
        }
    }
}

impl<P: Clone> LayerMixer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance local time of every enabled state.
    pub fn advance_times<C: crate::clip::Clip>(
        states: &mut StateTable<C>,
        dt: f32,
        component_wrap: WrapMode,
    ) {
        for state in states.iter_mut().filter(|s| s.enabled) {
            state.advance(dt, component_wrap);
        }
    }

    /// Sample every enabled, weighted state in registration order and mix.
    /// Falls back to the evaluator's bind pose when nothing contributes.
    pub fn evaluate<E>(
        &mut self,
        evaluator: &mut E,
        registry: &ClipRegistry<E::Clip>,
        states: &StateTable<E::Clip>,
    ) -> P
    where
        E: PoseEvaluator<Pose = P>,
    {
        self.weighted.clear();
        for binding in registry.all() {
            let Some(state) = states.get(binding.state) else {
                continue;
            };
            if !state.enabled || state.weight <= 0.0 {
                continue;
            }
            let pose = evaluator.evaluate(&state.clip, state.sample_time());
            self.weighted.push((pose, state.weight));
        }

        if self.weighted.is_empty() {
            return evaluator.bind_pose();
        }
        evaluator.mix(&self.weighted)
    }
}
