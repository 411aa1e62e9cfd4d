//! Identifiers for playback states.

use serde::{Deserialize, Serialize};

/// Stable arena index of a playback state. Never reused within a component,
/// so a handle to a removed state simply stops resolving.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub u32);

/// Monotonic allocator for StateId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_state: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_state(&mut self) -> StateId {
        let id = StateId(self.next_state);
        self.next_state = self.next_state.wrapping_add(1);
        id
    }
}
