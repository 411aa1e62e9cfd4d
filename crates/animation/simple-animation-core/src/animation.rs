//! The animation component: public operations over registry, states and mixer.
//!
//! Methods:
//! - lifecycle: new, initialize, activate, deactivate, teardown
//! - playback: play, play_state, play_queued, cross_fade, cross_fade_queued, blend, stop, rewind
//! - states: add_state, add_clip, remove_state, remove_clip, get_state, get_states, state, state_mut
//! - evaluation: tick (advance + mix), sample (mix without advancing)
//!
//! Evaluation is suspended while nothing is active. Any operation that can
//! make the graph produce visible output kicks it back on; the tick that finds
//! every state finished and no transition pending raises `Done` and suspends.

use std::sync::Arc;

use crate::clip::{Clip, ClipRef, ClipResolver, PoseEvaluator, WrapMode};
use crate::config::AnimationConfig;
use crate::error::AnimationError;
use crate::graph::{GraphRunState, LayerMixer};
use crate::ids::StateId;
use crate::mixer::{MixerPhase, QueueMode, RequestOutcome, TransitionMixer, TransitionRequest};
use crate::outputs::{AnimationEvent, EventQueue, Outputs};
use crate::registry::{ClipRegistry, Registration, DEFAULT_STATE_NAME};
use crate::snapshot::{validate_editor_states, EditorState, StateSnapshot};
use crate::state::{PlaybackState, StateTable};
use crate::Result;

/// Value handle to a playback state. Stays cheap to copy; resolves to nothing
/// once the state is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateHandle(StateId);

impl StateHandle {
    #[inline]
    pub fn id(&self) -> StateId {
        self.0
    }
}

/// Handles captured when enumeration began, in registration order.
///
/// Mutating the component while iterating is allowed but not reflected:
/// removed states stop resolving and added ones are not visited.
/// Clone the iterator to restart it.
#[derive(Clone, Debug)]
pub struct States {
    handles: std::vec::IntoIter<StateHandle>,
}

impl Iterator for States {
    type Item = StateHandle;

    fn next(&mut self) -> Option<StateHandle> {
        self.handles.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.handles.size_hint()
    }
}

impl ExactSizeIterator for States {}

/// Animation component generic over the host's evaluator.
pub struct SimpleAnimation<E: PoseEvaluator> {
    evaluator: E,
    config: AnimationConfig,
    default_clip: Option<ClipRef<E::Clip>>,
    editor_states: Vec<EditorState<E::Clip>>,

    registry: ClipRegistry<E::Clip>,
    states: StateTable<E::Clip>,
    mixer: TransitionMixer,
    layers: LayerMixer<E::Pose>,
    run: GraphRunState,

    events: EventQueue,
    outputs: Outputs<E::Pose>,
    pose: Option<E::Pose>,
}

impl<E: PoseEvaluator> SimpleAnimation<E> {
    pub fn new(evaluator: E, config: AnimationConfig) -> Self {
        Self {
            evaluator,
            mixer: TransitionMixer::new(config.max_queued_transitions),
            events: EventQueue::new(config.max_pending_events),
            config,
            default_clip: None,
            editor_states: vec![EditorState::default_for(None)],
            registry: ClipRegistry::new(),
            states: StateTable::new(),
            layers: LayerMixer::new(),
            run: GraphRunState::default(),
            outputs: Outputs::default(),
            pose: None,
        }
    }

    /// Builder form of [`Self::set_clip`].
    pub fn with_clip(mut self, clip: ClipRef<E::Clip>) -> Result<Self> {
        self.set_clip(Some(clip))?;
        Ok(self)
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    #[inline]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    #[inline]
    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    #[inline]
    pub fn run_state(&self) -> GraphRunState {
        self.run
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.run.is_initialized
    }

    #[inline]
    pub fn mixer_phase(&self) -> MixerPhase {
        self.mixer.phase()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Build states from the editor list, synthesize the default state, play
    /// and kick. Runs once until [`Self::teardown`].
    pub fn initialize(&mut self) {
        if self.run.is_initialized {
            return;
        }
        if self.editor_states.is_empty() {
            self.editor_states.push(EditorState::default_for(None));
        }

        let configured = self.editor_states.clone();
        for entry in configured {
            if let Some(clip) = entry.clip {
                self.register_state(&entry.name, clip);
            }
        }
        self.ensure_default_state_exists();

        self.run.is_initialized = true;
        self.play();
        self.kick();
    }

    /// Host enable hook: initialize, resume, and restart the default clip when
    /// playing automatically.
    pub fn activate(&mut self) {
        self.initialize();
        self.kick();
        if self.config.play_automatically {
            self.stop();
            self.play();
        }
    }

    /// Host disable hook: stop every state and suspend evaluation.
    pub fn deactivate(&mut self) {
        if self.run.is_initialized {
            self.stop();
            self.run.suspend();
        }
    }

    /// Drop all runtime state. The editor list survives, so a later
    /// [`Self::initialize`] rebuilds the same states.
    pub fn teardown(&mut self) {
        self.registry.clear();
        self.states.clear();
        self.mixer.clear();
        self.pose = None;
        self.run = GraphRunState::default();
    }

    // ---------------------------------------------------------------------
    // Component properties
    // ---------------------------------------------------------------------

    /// Primary clip, mirrored by the `"Default"` state.
    #[inline]
    pub fn clip(&self) -> Option<&ClipRef<E::Clip>> {
        self.default_clip.as_ref()
    }

    /// Replace the primary clip. Legacy clips are rejected before anything changes.
    pub fn set_clip(&mut self, clip: Option<ClipRef<E::Clip>>) -> Result<()> {
        if let Some(c) = clip.as_ref() {
            legacy_clip_check(c)?;
        }
        self.default_clip = clip;

        if let Some(head) = self.editor_states.first_mut() {
            if head.default_state {
                head.clip = self.default_clip.clone();
            }
        }

        if self.run.is_initialized {
            let changed = if self.default_clip.is_some() {
                self.ensure_default_state_exists()
            } else {
                self.unregister_state(DEFAULT_STATE_NAME)
            };
            if changed {
                self.rebuild_states();
            }
        }
        Ok(())
    }

    #[inline]
    pub fn play_automatically(&self) -> bool {
        self.config.play_automatically
    }

    #[inline]
    pub fn set_play_automatically(&mut self, value: bool) {
        self.config.play_automatically = value;
    }

    /// Component-wide wrap mode for states and clips left at `Default`.
    #[inline]
    pub fn wrap_mode(&self) -> WrapMode {
        self.config.wrap_mode
    }

    #[inline]
    pub fn set_wrap_mode(&mut self, mode: WrapMode) {
        self.config.wrap_mode = mode;
    }

    // ---------------------------------------------------------------------
    // Playback
    // ---------------------------------------------------------------------

    /// Play the default state if a primary clip is set and auto-play is on.
    /// Returns whether playback started.
    pub fn play(&mut self) -> bool {
        self.kick();
        if self.default_clip.is_some() && self.config.play_automatically {
            return self.play_state(DEFAULT_STATE_NAME);
        }
        false
    }

    /// Play `name` at full weight immediately, stopping every other state.
    pub fn play_state(&mut self, name: &str) -> bool {
        self.submit(name, |id| TransitionRequest::immediate(id, QueueMode::PlayNow))
    }

    pub fn play_queued(&mut self, name: &str, queue_mode: QueueMode) -> bool {
        self.submit(name, |id| TransitionRequest::immediate(id, queue_mode))
    }

    pub fn cross_fade(&mut self, name: &str, fade_length: f32) -> bool {
        self.cross_fade_queued(name, fade_length, QueueMode::PlayNow)
    }

    pub fn cross_fade_queued(&mut self, name: &str, fade_length: f32, queue_mode: QueueMode) -> bool {
        self.submit(name, |id| {
            TransitionRequest::crossfade(id, fade_length, queue_mode)
        })
    }

    /// Ramp `name` toward `target_weight` without touching other states.
    pub fn blend(&mut self, name: &str, target_weight: f32, fade_length: f32) -> bool {
        self.submit(name, |id| {
            TransitionRequest::blend(id, target_weight, fade_length)
        })
    }

    fn submit(&mut self, name: &str, make: impl FnOnce(StateId) -> TransitionRequest) -> bool {
        self.kick();
        let Some(id) = self.registry.lookup(name).map(|b| b.state) else {
            return false;
        };
        let outcome = self.mixer.request(make(id), &mut self.states);
        if outcome == RequestOutcome::Started {
            self.events.push(AnimationEvent::TransitionStarted {
                state: name.to_string(),
            });
        }
        outcome.accepted()
    }

    /// Stop every state and drop all transitions.
    pub fn stop(&mut self) {
        for state in self.states.iter_mut() {
            state.stop();
        }
        self.mixer.clear();
    }

    /// Stop one state. Unknown names are ignored.
    pub fn stop_state(&mut self, name: &str) -> bool {
        let Some(id) = self.registry.lookup(name).map(|b| b.state) else {
            return false;
        };
        if let Some(state) = self.states.get_mut(id) {
            state.stop();
        }
        self.mixer.forget(id);
        true
    }

    /// Reset every state to time zero.
    pub fn rewind(&mut self) {
        self.kick();
        for state in self.states.iter_mut() {
            state.set_time(0.0);
        }
    }

    pub fn rewind_state(&mut self, name: &str) -> bool {
        self.kick();
        let Some(id) = self.registry.lookup(name).map(|b| b.state) else {
            return false;
        };
        if let Some(state) = self.states.get_mut(id) {
            state.set_time(0.0);
        }
        true
    }

    /// Whether the graph is currently being evaluated.
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.run.is_playing
    }

    /// Whether `name` is enabled and has not finished.
    pub fn is_state_playing(&self, name: &str) -> bool {
        self.registry
            .lookup(name)
            .and_then(|b| self.states.get(b.state))
            .map(|s| s.is_playing())
            .unwrap_or(false)
    }

    // ---------------------------------------------------------------------
    // State list
    // ---------------------------------------------------------------------

    /// Register `clip` under `name`. Returns whether the registry changed.
    ///
    /// The `"Default"` state mirrors the primary clip, so adding under that
    /// name replaces the primary clip through [`Self::set_clip`].
    pub fn add_state(&mut self, clip: ClipRef<E::Clip>, name: &str) -> Result<bool> {
        legacy_clip_check(&clip)?;
        self.kick();
        if name == DEFAULT_STATE_NAME {
            let changed = !self
                .default_clip
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &clip));
            self.set_clip(Some(clip))?;
            return Ok(changed);
        }
        let changed = self.register_state(name, clip).changed();
        if changed {
            self.rebuild_states();
        }
        Ok(changed)
    }

    pub fn add_clip(&mut self, clip: ClipRef<E::Clip>, name: &str) -> Result<bool> {
        legacy_clip_check(&clip)?;
        self.add_state(clip, name)
    }

    pub fn remove_state(&mut self, name: &str) -> bool {
        let removed = self.unregister_state(name);
        if removed {
            self.rebuild_states();
        }
        removed
    }

    /// Remove every state bound to `clip`.
    pub fn remove_clip(&mut self, clip: Option<&ClipRef<E::Clip>>) -> Result<bool> {
        let clip = clip.ok_or_else(|| AnimationError::missing_clip("clip"))?;
        let mut removed = false;
        for name in self.registry.names_bound_to(clip) {
            removed |= self.unregister_state(&name);
        }
        if removed {
            self.rebuild_states();
        }
        Ok(removed)
    }

    pub fn get_state(&self, name: &str) -> Option<StateHandle> {
        self.registry.lookup(name).map(|b| StateHandle(b.state))
    }

    /// Alias for [`Self::get_state`].
    #[inline]
    pub fn state_by_name(&self, name: &str) -> Option<StateHandle> {
        self.get_state(name)
    }

    pub fn get_states(&self) -> States {
        let handles: Vec<StateHandle> = self.registry.all().map(|b| StateHandle(b.state)).collect();
        States {
            handles: handles.into_iter(),
        }
    }

    #[inline]
    pub fn clip_count(&self) -> usize {
        self.registry.count()
    }

    /// True iff the handle's state still exists and is still registered.
    pub fn is_valid(&self, handle: StateHandle) -> bool {
        self.states.contains(handle.0) && self.registry.lookup_state(handle.0).is_some()
    }

    pub fn state(&self, handle: StateHandle) -> Option<StateView<'_, E::Clip>> {
        if !self.is_valid(handle) {
            return None;
        }
        let state = self.states.get(handle.0)?;
        Some(StateView {
            state,
            component_wrap: self.config.wrap_mode,
        })
    }

    pub fn state_mut(&mut self, handle: StateHandle) -> Option<StateMut<'_, E>> {
        if !self.is_valid(handle) {
            return None;
        }
        Some(StateMut {
            owner: self,
            id: handle.0,
        })
    }

    // ---------------------------------------------------------------------
    // Editor list and persistence
    // ---------------------------------------------------------------------

    pub fn editor_states(&self) -> &[EditorState<E::Clip>] {
        &self.editor_states
    }

    /// Replace the configured state list, repairing it first. Takes effect
    /// on the next [`Self::initialize`].
    pub fn set_editor_states(&mut self, states: Vec<EditorState<E::Clip>>) {
        let mut states = states;
        validate_editor_states(&mut self.default_clip, &mut states);
        if self.run.is_initialized {
            log::debug!("editor states replaced on an initialized component; applied on next initialize");
        }
        self.editor_states = states;
    }

    pub fn snapshot(&self) -> Vec<StateSnapshot> {
        self.editor_states.iter().map(EditorState::to_snapshot).collect()
    }

    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Restore a persisted list. The default entry's clip becomes the primary clip.
    pub fn restore_snapshot(
        &mut self,
        snapshots: &[StateSnapshot],
        resolver: &mut impl ClipResolver<E::Clip>,
    ) {
        let states: Vec<EditorState<E::Clip>> =
            snapshots.iter().map(|s| s.resolve(resolver)).collect();
        if let Some(head) = states
            .iter()
            .find(|s| s.default_state && s.name == DEFAULT_STATE_NAME)
        {
            if head.clip.is_some() {
                self.default_clip = head.clip.clone();
            }
        }
        self.set_editor_states(states);
    }

    pub fn restore_snapshot_json(
        &mut self,
        json: &str,
        resolver: &mut impl ClipResolver<E::Clip>,
    ) -> Result<()> {
        let snapshots: Vec<StateSnapshot> = serde_json::from_str(json)?;
        self.restore_snapshot(&snapshots, resolver);
        Ok(())
    }

    /// Distinct clips referenced by the editor list.
    pub fn animation_clips(&self) -> Vec<ClipRef<E::Clip>> {
        let mut out: Vec<ClipRef<E::Clip>> = Vec::new();
        for clip in self.editor_states.iter().filter_map(|s| s.clip.as_ref()) {
            if !out.iter().any(|c| Arc::ptr_eq(c, clip)) {
                out.push(Arc::clone(clip));
            }
        }
        out
    }

    // ---------------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------------

    /// Advance by `dt` seconds and mix. While suspended only pending events
    /// are delivered.
    pub fn tick(&mut self, dt: f32) -> &Outputs<E::Pose> {
        self.outputs.clear();

        if self.run.is_playing {
            let step = self.mixer.advance(
                dt,
                &mut self.states,
                self.config.fade_curve,
                self.config.negligible_weight,
            );
            for id in step.finished {
                if let Some(binding) = self.registry.lookup_state(id) {
                    self.events.push(AnimationEvent::TransitionFinished {
                        state: binding.name.clone(),
                    });
                }
            }
            for id in step.started {
                if let Some(binding) = self.registry.lookup_state(id) {
                    self.events.push(AnimationEvent::TransitionStarted {
                        state: binding.name.clone(),
                    });
                }
            }

            LayerMixer::<E::Pose>::advance_times(&mut self.states, dt, self.config.wrap_mode);
            let pose = self
                .layers
                .evaluate(&mut self.evaluator, &self.registry, &self.states);
            self.pose = Some(pose.clone());
            self.outputs.pose = Some(pose);

            if !self.states.any_playing() && !self.mixer.is_pending() {
                self.run.suspend();
                log::debug!("animation graph done; suspending");
                self.events.push(AnimationEvent::Done);
            }
        }

        self.outputs.events.extend(self.events.drain());
        &self.outputs
    }

    /// Evaluate once at the current times and weights without advancing.
    pub fn sample(&mut self) -> &E::Pose {
        let pose = self
            .layers
            .evaluate(&mut self.evaluator, &self.registry, &self.states);
        self.pose.insert(pose)
    }

    /// Pose from the most recent tick or sample.
    #[inline]
    pub fn current_pose(&self) -> Option<&E::Pose> {
        self.pose.as_ref()
    }

    /// Take events raised since the last tick without ticking.
    pub fn drain_events(&mut self) -> Vec<AnimationEvent> {
        self.events.drain().collect()
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    #[inline]
    fn kick(&mut self) {
        self.run.kick();
    }

    fn register_state(&mut self, name: &str, clip: ClipRef<E::Clip>) -> Registration {
        let registration = self.registry.register(name, Arc::clone(&clip));
        match registration {
            Registration::Added(id) => {
                self.states.insert(PlaybackState::new(id, name, clip));
            }
            Registration::Replaced(id) => {
                self.states.rebind(id, clip);
            }
            Registration::Rejected | Registration::Unchanged(_) => {}
        }
        registration
    }

    fn unregister_state(&mut self, name: &str) -> bool {
        match self.registry.unregister(name) {
            Some(binding) => {
                self.states.remove(binding.state);
                self.mixer.forget(binding.state);
                true
            }
            None => false,
        }
    }

    /// Make the `"Default"` state exist and mirror the primary clip.
    /// Returns whether the registry changed.
    fn ensure_default_state_exists(&mut self) -> bool {
        let Some(clip) = self.default_clip.clone() else {
            return false;
        };
        let changed = self.register_state(DEFAULT_STATE_NAME, clip).changed();
        if changed {
            self.kick();
        }
        changed
    }

    /// Refresh the editor list from the live registry and notify listeners.
    fn rebuild_states(&mut self) {
        let mut list: Vec<EditorState<E::Clip>> = self
            .registry
            .all()
            .map(|b| EditorState {
                clip: Some(Arc::clone(&b.clip)),
                name: b.name.clone(),
                default_state: b.is_default,
            })
            .collect();
        if !list.first().map(|s| s.default_state).unwrap_or(false) {
            list.retain(|s| !s.default_state);
            list.insert(0, EditorState::default_for(self.default_clip.clone()));
        }
        self.editor_states = list;
        self.events.push(AnimationEvent::StatesRebuilt {
            count: self.registry.count(),
        });
    }
}

fn legacy_clip_check<C: Clip>(clip: &ClipRef<C>) -> Result<()> {
    if clip.is_legacy_format() {
        return Err(AnimationError::legacy_clip(clip.name()));
    }
    Ok(())
}

/// Read-only view of one state.
pub struct StateView<'a, C> {
    state: &'a PlaybackState<C>,
    component_wrap: WrapMode,
}

impl<'a, C: Clip> StateView<'a, C> {
    #[inline]
    pub fn name(&self) -> &'a str {
        &self.state.name
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.state.enabled
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.state.time
    }

    #[inline]
    pub fn normalized_time(&self) -> f32 {
        self.state.normalized_time()
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.state.speed
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.state.weight
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.state.length()
    }

    #[inline]
    pub fn clip(&self) -> &'a ClipRef<C> {
        &self.state.clip
    }

    /// The state's own setting; `Default` when it defers.
    #[inline]
    pub fn wrap_mode(&self) -> WrapMode {
        self.state.wrap_mode
    }

    /// The wrap mode the tick will apply.
    #[inline]
    pub fn effective_wrap_mode(&self) -> WrapMode {
        self.state.effective_wrap_mode(self.component_wrap)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }
}

/// Mutable view of one state. Setters that can change visible output kick
/// the graph.
pub struct StateMut<'a, E: PoseEvaluator> {
    owner: &'a mut SimpleAnimation<E>,
    id: StateId,
}

impl<'a, E: PoseEvaluator> StateMut<'a, E> {
    fn update(&mut self, f: impl FnOnce(&mut PlaybackState<E::Clip>)) {
        if let Some(state) = self.owner.states.get_mut(self.id) {
            f(state);
        }
    }

    pub fn view(&self) -> Option<StateView<'_, E::Clip>> {
        self.owner.state(StateHandle(self.id))
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.update(|s| {
            if enabled {
                s.start();
            } else {
                s.enabled = false;
            }
        });
        if enabled {
            self.owner.kick();
        } else {
            self.owner.mixer.forget(self.id);
        }
        self
    }

    pub fn set_time(&mut self, time: f32) -> &mut Self {
        self.update(|s| s.set_time(time));
        self.owner.kick();
        self
    }

    pub fn set_normalized_time(&mut self, normalized: f32) -> &mut Self {
        self.update(|s| s.set_normalized_time(normalized));
        self.owner.kick();
        self
    }

    pub fn set_speed(&mut self, speed: f32) -> &mut Self {
        self.update(|s| s.speed = speed);
        self.owner.kick();
        self
    }

    /// Clamped to [0, 1].
    pub fn set_weight(&mut self, weight: f32) -> &mut Self {
        self.update(|s| s.set_weight(weight));
        self.owner.kick();
        self
    }

    /// Override the wrap mode for this state only. A finished state resumes
    /// if the new mode is not terminal.
    pub fn set_wrap_mode(&mut self, mode: WrapMode) -> &mut Self {
        let component = self.owner.config.wrap_mode;
        let mut resumed = false;
        self.update(|s| {
            s.wrap_mode = mode;
            if s.finished && s.effective_wrap_mode(component) != WrapMode::Once {
                s.finished = false;
                resumed = true;
            }
        });
        if resumed {
            self.owner.kick();
        }
        self
    }

    /// Rename the state. Clashing names are disambiguated; the name actually
    /// applied is returned. The `"Default"` state is bound to the primary clip
    /// and cannot be renamed, nor can another state take its name.
    pub fn set_name(&mut self, name: &str) -> Option<String> {
        let old = self.owner.states.get(self.id)?.name.clone();
        if old == DEFAULT_STATE_NAME || name == DEFAULT_STATE_NAME {
            log::warn!("cannot rename '{}' to '{}': the default state name is reserved", old, name);
            return None;
        }
        let applied = self.owner.registry.rename(&old, name)?;
        let new_name = applied.clone();
        self.update(|s| s.name = new_name);
        if applied != old {
            self.owner.rebuild_states();
        }
        Some(applied)
    }
}
