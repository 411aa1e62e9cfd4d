//! Clip registry: state name -> clip binding, in registration order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::clip::{Clip, ClipRef};
use crate::ids::{IdAllocator, StateId};

/// Name given to the state that mirrors the component's primary clip.
pub const DEFAULT_STATE_NAME: &str = "Default";

/// One registered clip. The clip reference is shared with the playback state.
pub struct ClipBinding<C> {
    pub name: String,
    pub clip: ClipRef<C>,
    pub is_default: bool,
    pub state: StateId,
}

impl<C> Clone for ClipBinding<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            clip: Arc::clone(&self.clip),
            is_default: self.is_default,
            state: self.state,
        }
    }
}

impl<C: Clip> fmt::Debug for ClipBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipBinding")
            .field("name", &self.name)
            .field("clip", &self.clip.name())
            .field("is_default", &self.is_default)
            .field("state", &self.state)
            .finish()
    }
}

/// Result of a registration attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    /// Legacy clip; nothing changed.
    Rejected,
    /// Same name already bound to the same clip.
    Unchanged(StateId),
    /// New name; a fresh state id was allocated.
    Added(StateId),
    /// Existing name re-bound to a different clip; the state id is kept.
    Replaced(StateId),
}

impl Registration {
    /// Whether registry membership or bindings changed.
    #[inline]
    pub fn changed(&self) -> bool {
        matches!(self, Registration::Added(_) | Registration::Replaced(_))
    }

    #[inline]
    pub fn state(&self) -> Option<StateId> {
        match self {
            Registration::Rejected => None,
            Registration::Unchanged(id) | Registration::Added(id) | Registration::Replaced(id) => {
                Some(*id)
            }
        }
    }
}

pub struct ClipRegistry<C> {
    ids: IdAllocator,
    bindings: IndexMap<String, ClipBinding<C>>,
}

impl<C> Default for ClipRegistry<C> {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new(),
            bindings: IndexMap::new(),
        }
    }
}

impl<C: Clip> fmt::Debug for ClipRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings.values()).finish()
    }
}

impl<C: Clip> ClipRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `clip` under `name`. Legacy clips are rejected with a logged error;
    /// callers that must fail loudly check [`Clip::is_legacy_format`] first.
    pub fn register(&mut self, name: &str, clip: ClipRef<C>) -> Registration {
        if clip.is_legacy_format() {
            log::error!(
                "Animation clip {} in state {} is Legacy. Set clip.legacy to false, or reimport as Generic to use it",
                clip.name(),
                name
            );
            return Registration::Rejected;
        }

        if let Some(existing) = self.bindings.get_mut(name) {
            if Arc::ptr_eq(&existing.clip, &clip) {
                return Registration::Unchanged(existing.state);
            }
            existing.clip = clip;
            return Registration::Replaced(existing.state);
        }

        let state = self.ids.alloc_state();
        self.bindings.insert(
            name.to_string(),
            ClipBinding {
                name: name.to_string(),
                clip,
                is_default: name == DEFAULT_STATE_NAME,
                state,
            },
        );
        Registration::Added(state)
    }

    /// Remove the binding for `name`, keeping the order of the others.
    pub fn unregister(&mut self, name: &str) -> Option<ClipBinding<C>> {
        self.bindings.shift_remove(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&ClipBinding<C>> {
        self.bindings.get(name)
    }

    pub fn lookup_state(&self, state: StateId) -> Option<&ClipBinding<C>> {
        self.bindings.values().find(|b| b.state == state)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in registration order.
    pub fn all(&self) -> impl Iterator<Item = &ClipBinding<C>> + Clone + '_ {
        self.bindings.values()
    }

    /// Names of every binding that refers to `clip`.
    pub fn names_bound_to(&self, clip: &ClipRef<C>) -> Vec<String> {
        self.bindings
            .values()
            .filter(|b| Arc::ptr_eq(&b.clip, clip))
            .map(|b| b.name.clone())
            .collect()
    }

    /// Re-key a binding in place. Returns the name actually used, which is
    /// `new_name` made unique against the other bindings.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Option<String> {
        let index = self.bindings.get_index_of(old_name)?;
        if old_name == new_name {
            return Some(new_name.to_string());
        }
        let (_, mut binding) = self.bindings.shift_remove_index(index)?;
        let unique = unique_name(self.bindings.keys().map(String::as_str), new_name);
        binding.name = unique.clone();
        binding.is_default = unique == DEFAULT_STATE_NAME;
        self.bindings.shift_insert(index, unique.clone(), binding);
        Some(unique)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

/// Make `name` unique among `taken` by appending ` (n)` with the smallest free
/// `n`. An existing ` (n)` suffix on `name` is replaced rather than stacked.
pub fn unique_name<'a>(taken: impl Iterator<Item = &'a str> + Clone, name: &str) -> String {
    if !taken.clone().any(|t| t == name) {
        return name.to_string();
    }
    let stem = strip_counter(name);
    (1u32..)
        .map(|n| format!("{stem} ({n})"))
        .find(|candidate| !taken.clone().any(|t| t == candidate))
        .unwrap_or_else(|| name.to_string())
}

fn strip_counter(name: &str) -> &str {
    if let Some(open) = name.rfind(" (") {
        let tail = &name[open + 2..];
        if let Some(digits) = tail.strip_suffix(')') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return &name[..open];
            }
        }
    }
    name
}
