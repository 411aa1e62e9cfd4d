//! Playback states: one mutable record per registered clip.
//!
//! Records live in an arena keyed by [`StateId`]; the registry owns the
//! name -> id mapping and the display order.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::clip::{Clip, ClipRef, WrapMode};
use crate::ids::StateId;

/// Mutable playback parameters for one named clip.
pub struct PlaybackState<C> {
    pub id: StateId,
    pub name: String,
    pub clip: ClipRef<C>,
    pub enabled: bool,
    /// Local time in seconds, already wrapped into the clip's range.
    pub time: f32,
    pub speed: f32,
    pub weight: f32,
    /// Per-state override; `Default` defers to the clip and component.
    pub wrap_mode: WrapMode,
    /// A `Once` state reached its end in the direction of travel.
    pub finished: bool,
    /// +1 or -1; ping-pong flips it at each edge.
    direction: f32,
}

impl<C> fmt::Debug for PlaybackState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("time", &self.time)
            .field("speed", &self.speed)
            .field("weight", &self.weight)
            .field("wrap_mode", &self.wrap_mode)
            .field("finished", &self.finished)
            .finish()
    }
}

fn fmod(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

/// Advance `time` by `step` on a ping-pong clip of `span` seconds.
///
/// Works in the unfolded period `[0, 2 * span)`: the first half plays forward,
/// the second half backward. Returns the folded time and direction of travel.
fn ping_pong(time: f32, direction: f32, step: f32, span: f32) -> (f32, f32) {
    let period = 2.0 * span;
    let unfolded = if direction < 0.0 { period - time } else { time };
    let m = fmod(unfolded + step, period);
    if m <= span {
        (m.max(0.0), 1.0)
    } else {
        ((period - m).max(0.0), -1.0)
    }
}

impl<C: Clip> PlaybackState<C> {
    pub fn new(id: StateId, name: impl Into<String>, clip: ClipRef<C>) -> Self {
        Self {
            id,
            name: name.into(),
            clip,
            enabled: false,
            time: 0.0,
            speed: 1.0,
            weight: 0.0,
            wrap_mode: WrapMode::Default,
            finished: false,
            direction: 1.0,
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.clip.length()
    }

    /// `time / length`, or `time` itself for zero-length clips.
    #[inline]
    pub fn normalized_time(&self) -> f32 {
        let length = self.length();
        if length > 0.0 {
            self.time / length
        } else {
            self.time
        }
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time.max(0.0);
        self.finished = false;
        self.direction = 1.0;
    }

    /// Clamped to [0, 1] of the clip when it has a length.
    pub fn set_normalized_time(&mut self, normalized: f32) {
        let length = self.length();
        if length > 0.0 {
            self.set_time(normalized.clamp(0.0, 1.0) * length);
        } else {
            self.set_time(normalized);
        }
    }

    #[inline]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    /// Resolve the wrap mode actually applied this tick.
    #[inline]
    pub fn effective_wrap_mode(&self, component: WrapMode) -> WrapMode {
        WrapMode::resolve(self.wrap_mode, self.clip.wrap_mode(), component)
    }

    /// Enabled and not parked at the end of a `Once` clip.
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.enabled && !self.finished
    }

    /// Disable, zero the weight and rewind.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.weight = 0.0;
        self.set_time(0.0);
    }

    /// Enable for playback, rewinding if the state was idle or finished.
    pub fn start(&mut self) {
        if !self.enabled || self.finished {
            self.set_time(0.0);
        }
        self.enabled = true;
    }

    /// Advance local time by `dt` scaled by speed, applying the wrap mode.
    pub fn advance(&mut self, dt: f32, component_wrap: WrapMode) {
        if !self.enabled || self.finished {
            return;
        }
        let length = self.length();
        let step = dt * self.speed;
        if length <= 0.0 {
            self.time = 0.0;
            if matches!(self.effective_wrap_mode(component_wrap), WrapMode::Once) && step != 0.0 {
                self.finished = true;
            }
            return;
        }

        match self.effective_wrap_mode(component_wrap) {
            WrapMode::Loop => {
                self.time = fmod(self.time + step, length);
            }
            WrapMode::PingPong => {
                let (time, direction) = ping_pong(self.time, self.direction, step, length);
                self.time = time;
                self.direction = direction;
            }
            WrapMode::ClampForever => {
                self.time = (self.time + step).clamp(0.0, length);
            }
            WrapMode::Once | WrapMode::Default => {
                let t = self.time + step;
                if step > 0.0 && t >= length {
                    self.time = length;
                    self.finished = true;
                } else if step < 0.0 && t <= 0.0 {
                    self.time = 0.0;
                    self.finished = true;
                } else {
                    self.time = t.clamp(0.0, length);
                }
            }
        }
    }

    /// Normalized time handed to the evaluator, always in [0, 1].
    #[inline]
    pub fn sample_time(&self) -> f32 {
        let length = self.length();
        if length > 0.0 {
            (self.time / length).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Arena of playback states.
pub struct StateTable<C> {
    states: HashMap<StateId, PlaybackState<C>>,
}

impl<C> Default for StateTable<C> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<C> fmt::Debug for StateTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.states.iter()).finish()
    }
}

impl<C: Clip> StateTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: PlaybackState<C>) {
        self.states.insert(state.id, state);
    }

    pub fn remove(&mut self, id: StateId) -> Option<PlaybackState<C>> {
        self.states.remove(&id)
    }

    #[inline]
    pub fn get(&self, id: StateId) -> Option<&PlaybackState<C>> {
        self.states.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: StateId) -> Option<&mut PlaybackState<C>> {
        self.states.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    /// Re-bind a state to a different clip, keeping playback parameters.
    pub fn rebind(&mut self, id: StateId, clip: ClipRef<C>) {
        if let Some(state) = self.states.get_mut(&id) {
            if !Arc::ptr_eq(&state.clip, &clip) {
                state.clip = clip;
                let length = state.length();
                state.time = if length > 0.0 {
                    state.time.min(length)
                } else {
                    0.0
                };
                state.finished = false;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaybackState<C>> {
        self.states.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlaybackState<C>> {
        self.states.values_mut()
    }

    pub fn any_playing(&self) -> bool {
        self.states.values().any(|s| s.is_playing())
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
