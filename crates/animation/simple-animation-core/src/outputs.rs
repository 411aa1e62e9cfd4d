//! Output contracts from the component.
//!
//! Each tick produces at most one blended pose plus the semantic events raised
//! since the previous tick. Hosts apply the pose and route the events.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Discrete signals raised by the component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimationEvent {
    /// Every enabled state finished and no transition is pending; ticking is suspended.
    Done,
    /// Registry membership changed; editor views should refresh.
    StatesRebuilt { count: usize },
    TransitionStarted { state: String },
    TransitionFinished { state: String },
}

/// Outputs returned by `SimpleAnimation::tick()`.
#[derive(Clone, Debug)]
pub struct Outputs<P> {
    /// Pose evaluated this tick; `None` when evaluation was suspended.
    pub pose: Option<P>,
    pub events: Vec<AnimationEvent>,
}

impl<P> Default for Outputs<P> {
    fn default() -> Self {
        Self {
            pose: None,
            events: Vec::new(),
        }
    }
}

impl<P> Outputs<P> {
    #[inline]
    pub fn clear(&mut self) {
        self.pose = None;
        self.events.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.events.is_empty()
    }

    #[inline]
    pub fn has_event(&self, event: &AnimationEvent) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

/// Bounded buffer of events awaiting delivery.
#[derive(Debug)]
pub(crate) struct EventQueue {
    events: VecDeque<AnimationEvent>,
    limit: usize,
}

impl EventQueue {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub(crate) fn push(&mut self, event: AnimationEvent) {
        if self.events.len() >= self.limit {
            if let Some(dropped) = self.events.pop_front() {
                log::warn!("event buffer full ({}); dropping {:?}", self.limit, dropped);
            }
        }
        self.events.push_back(event);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = AnimationEvent> + '_ {
        self.events.drain(..)
    }
}
