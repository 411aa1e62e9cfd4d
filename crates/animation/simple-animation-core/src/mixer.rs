//! Transition mixer: the single active crossfade/blend plus its queue.
//!
//! Weights are ramped in simulated time. Preempting a fade freezes every
//! weight where it stands; the next crossfade then treats all still-weighted
//! states as outgoing and ramps them down from those frozen values.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::config::FadeCurve;
use crate::ids::StateId;
use crate::state::StateTable;

/// How a request interacts with a transition already in flight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueMode {
    /// Wait until the active transition completes.
    #[default]
    Queued,
    /// Abandon the active transition and any pending requests.
    PlayNow,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransitionMode {
    /// Target jumps to full weight; every other state stops.
    Immediate,
    /// Target ramps to 1 while all other weighted states ramp to 0.
    Crossfade,
    /// Target ramps to `target_weight`; other states keep their weights.
    Blend { target_weight: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target: StateId,
    pub fade_duration: f32,
    pub mode: TransitionMode,
    pub queue_mode: QueueMode,
}

impl TransitionRequest {
    pub fn immediate(target: StateId, queue_mode: QueueMode) -> Self {
        Self {
            target,
            fade_duration: 0.0,
            mode: TransitionMode::Immediate,
            queue_mode,
        }
    }

    pub fn crossfade(target: StateId, fade_duration: f32, queue_mode: QueueMode) -> Self {
        Self {
            target,
            fade_duration,
            mode: TransitionMode::Crossfade,
            queue_mode,
        }
    }

    /// Blends always preempt; they have no queued form.
    pub fn blend(target: StateId, target_weight: f32, fade_duration: f32) -> Self {
        Self {
            target,
            fade_duration,
            mode: TransitionMode::Blend { target_weight },
            queue_mode: QueueMode::PlayNow,
        }
    }
}

/// Observable mixer phase. A completed transition passes through `Done`
/// inside [`TransitionMixer::advance`] and is reported in [`MixerStep::finished`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixerPhase {
    Idle,
    /// Target fading in, outgoing states fading out.
    Fading,
    /// Fading, with at least one request waiting behind it.
    QueuedPending,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    NotFound,
    /// Applied synchronously (immediate play).
    Applied,
    Started,
    Queued,
}

impl RequestOutcome {
    #[inline]
    pub fn accepted(&self) -> bool {
        !matches!(self, RequestOutcome::NotFound)
    }
}

/// What happened during one `advance`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MixerStep {
    pub started: Vec<StateId>,
    pub finished: Vec<StateId>,
}

#[derive(Clone, Debug)]
struct ActiveTransition {
    target: StateId,
    mode: TransitionMode,
    duration: f32,
    elapsed: f32,
    from_weight: f32,
    to_weight: f32,
    /// (state, weight when the fade began)
    outgoing: Vec<(StateId, f32)>,
}

#[derive(Debug)]
pub struct TransitionMixer {
    active: Option<ActiveTransition>,
    queue: VecDeque<TransitionRequest>,
    max_queued: usize,
}

impl TransitionMixer {
    pub fn new(max_queued: usize) -> Self {
        Self {
            active: None,
            queue: VecDeque::new(),
            max_queued: max_queued.max(1),
        }
    }

    pub fn phase(&self) -> MixerPhase {
        match (&self.active, self.queue.is_empty()) {
            (None, true) => MixerPhase::Idle,
            (Some(_), true) => MixerPhase::Fading,
            _ => MixerPhase::QueuedPending,
        }
    }

    /// True while a transition is active or waiting.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.active.is_some() || !self.queue.is_empty()
    }

    #[inline]
    pub fn active_target(&self) -> Option<StateId> {
        self.active.as_ref().map(|a| a.target)
    }

    #[inline]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Submit a request. Unknown targets are rejected without side effects.
    pub fn request<C: Clip>(
        &mut self,
        req: TransitionRequest,
        states: &mut StateTable<C>,
    ) -> RequestOutcome {
        if !states.contains(req.target) {
            return RequestOutcome::NotFound;
        }
        match req.queue_mode {
            QueueMode::Queued if self.active.is_some() => {
                if self.queue.len() >= self.max_queued {
                    if let Some(dropped) = self.queue.pop_front() {
                        log::warn!(
                            "transition queue full ({}); dropping request for {:?}",
                            self.max_queued,
                            dropped.target
                        );
                    }
                }
                self.queue.push_back(req);
                RequestOutcome::Queued
            }
            QueueMode::Queued => self.begin(req, states),
            QueueMode::PlayNow => {
                self.queue.clear();
                self.begin(req, states)
            }
        }
    }

    fn begin<C: Clip>(&mut self, req: TransitionRequest, states: &mut StateTable<C>) -> RequestOutcome {
        // Whatever was in flight is abandoned with its weights frozen.
        self.active = None;

        let Some(target) = states.get_mut(req.target) else {
            return RequestOutcome::NotFound;
        };
        target.start();

        match req.mode {
            TransitionMode::Immediate => {
                target.set_weight(1.0);
                for state in states.iter_mut().filter(|s| s.id != req.target) {
                    state.stop();
                }
                log::debug!("played {:?} immediately", req.target);
                RequestOutcome::Applied
            }
            TransitionMode::Crossfade => {
                let from_weight = target.weight;
                let outgoing = states
                    .iter()
                    .filter(|s| s.id != req.target && s.enabled && s.weight > 0.0)
                    .map(|s| (s.id, s.weight))
                    .collect();
                self.active = Some(ActiveTransition {
                    target: req.target,
                    mode: req.mode,
                    duration: req.fade_duration.max(0.0),
                    elapsed: 0.0,
                    from_weight,
                    to_weight: 1.0,
                    outgoing,
                });
                log::debug!(
                    "crossfade to {:?} over {}s started",
                    req.target,
                    req.fade_duration
                );
                RequestOutcome::Started
            }
            TransitionMode::Blend { target_weight } => {
                self.active = Some(ActiveTransition {
                    target: req.target,
                    mode: req.mode,
                    duration: req.fade_duration.max(0.0),
                    elapsed: 0.0,
                    from_weight: target.weight,
                    to_weight: target_weight.clamp(0.0, 1.0),
                    outgoing: Vec::new(),
                });
                log::debug!(
                    "blend of {:?} toward {} over {}s started",
                    req.target,
                    target_weight,
                    req.fade_duration
                );
                RequestOutcome::Started
            }
        }
    }

    /// Ramp weights by `dt`, settle a completed transition and start the next
    /// queued one. A started transition begins ramping on the following call.
    pub fn advance<C: Clip>(
        &mut self,
        dt: f32,
        states: &mut StateTable<C>,
        curve: FadeCurve,
        negligible_weight: f32,
    ) -> MixerStep {
        let mut step = MixerStep::default();

        if let Some(active) = self.active.as_mut() {
            active.elapsed += dt.max(0.0);
            let progress = if active.duration <= 0.0 {
                1.0
            } else {
                (active.elapsed / active.duration).min(1.0)
            };
            let c = curve.apply(progress);

            if let Some(target) = states.get_mut(active.target) {
                target.set_weight(active.from_weight + (active.to_weight - active.from_weight) * c);
            }
            for (id, start) in &active.outgoing {
                if let Some(state) = states.get_mut(*id) {
                    state.set_weight(start * (1.0 - c));
                }
            }

            if progress >= 1.0 {
                let done = self.active.take();
                if let Some(done) = done {
                    Self::settle(&done, states, negligible_weight);
                    log::debug!("transition to {:?} finished", done.target);
                    step.finished.push(done.target);
                }
            }
        }

        if self.active.is_none() {
            while let Some(next) = self.queue.pop_front() {
                let target = next.target;
                match self.begin(next, states) {
                    RequestOutcome::Started => {
                        step.started.push(target);
                        break;
                    }
                    // Applied at once; there is no fade to report.
                    RequestOutcome::Applied => break,
                    // Target removed while waiting; try the next one.
                    RequestOutcome::NotFound | RequestOutcome::Queued => {}
                }
            }
        }

        step
    }

    fn settle<C: Clip>(done: &ActiveTransition, states: &mut StateTable<C>, negligible_weight: f32) {
        match done.mode {
            TransitionMode::Crossfade | TransitionMode::Immediate => {
                if let Some(target) = states.get_mut(done.target) {
                    target.set_weight(1.0);
                }
                for state in states.iter_mut().filter(|s| s.id != done.target) {
                    if state.enabled || state.weight > 0.0 {
                        state.stop();
                    }
                }
            }
            TransitionMode::Blend { .. } => {
                if let Some(target) = states.get_mut(done.target) {
                    if target.weight <= negligible_weight {
                        target.stop();
                    }
                }
            }
        }
    }

    /// Drop everything, active and queued.
    pub fn clear(&mut self) {
        self.active = None;
        self.queue.clear();
    }

    /// Forget a state that is being removed or stopped.
    pub fn forget(&mut self, id: StateId) {
        if self.active_target() == Some(id) {
            self.active = None;
        }
        if let Some(active) = self.active.as_mut() {
            active.outgoing.retain(|(s, _)| *s != id);
        }
        self.queue.retain(|r| r.target != id);
    }
}
