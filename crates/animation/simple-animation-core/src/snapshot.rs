//! Editor-facing state list and its persistence snapshot.
//!
//! The editor list is what a scene file stores: clip, name and the default
//! flag per state. Edits go through [`validate_editor_states`], which repairs
//! the list instead of rejecting it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipRef, ClipResolver};
use crate::registry::{unique_name, DEFAULT_STATE_NAME};

/// One configured state as the editor sees it.
pub struct EditorState<C> {
    pub clip: Option<ClipRef<C>>,
    pub name: String,
    pub default_state: bool,
}

impl<C> EditorState<C> {
    pub fn new(clip: Option<ClipRef<C>>, name: impl Into<String>) -> Self {
        Self {
            clip,
            name: name.into(),
            default_state: false,
        }
    }

    /// The default entry, bound to the component's primary clip.
    pub fn default_for(clip: Option<ClipRef<C>>) -> Self {
        Self {
            clip,
            name: DEFAULT_STATE_NAME.to_string(),
            default_state: true,
        }
    }
}

impl<C> Clone for EditorState<C> {
    fn clone(&self) -> Self {
        Self {
            clip: self.clip.clone(),
            name: self.name.clone(),
            default_state: self.default_state,
        }
    }
}

impl<C: Clip> fmt::Debug for EditorState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("clip", &self.clip.as_ref().map(|c| c.name().to_string()))
            .field("name", &self.name)
            .field("default_state", &self.default_state)
            .finish()
    }
}

impl<C: Clip> EditorState<C> {
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            name: self.name.clone(),
            clip_ref: self.clip.as_ref().map(|c| c.name().to_string()),
            is_default: self.default_state,
        }
    }
}

/// Serializable form of one state: clips are referenced by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_ref: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl StateSnapshot {
    /// Resolve the clip reference. Unresolvable references become empty slots.
    pub fn resolve<C>(&self, resolver: &mut impl ClipResolver<C>) -> EditorState<C> {
        let clip = self.clip_ref.as_deref().and_then(|r| {
            let clip = resolver.resolve(r);
            if clip.is_none() {
                log::warn!("clip '{}' for state '{}' could not be resolved", r, self.name);
            }
            clip
        });
        EditorState {
            clip,
            name: self.name.clone(),
            default_state: self.is_default,
        }
    }
}

/// Repair an edited state list in place.
///
/// After this runs: the list is non-empty, entry 0 is the only default and is
/// named `"Default"` and bound to `default_clip`, unnamed entries with a clip
/// take the clip's name, names are unique, and no entry holds a legacy clip.
/// A legacy `default_clip` is logged and cleared.
pub fn validate_editor_states<C: Clip>(
    default_clip: &mut Option<ClipRef<C>>,
    states: &mut Vec<EditorState<C>>,
) {
    if let Some(clip) = default_clip.as_ref() {
        if clip.is_legacy_format() {
            log::error!(
                "Animation clip {} is Legacy. Set clip.legacy to false, or reimport as Generic to use it",
                clip.name()
            );
            *default_clip = None;
        }
    }

    let first_is_default = states
        .first()
        .map(|s| s.default_state && s.name == DEFAULT_STATE_NAME)
        .unwrap_or(false);
    if !first_is_default {
        states.insert(0, EditorState::default_for(default_clip.clone()));
    }

    let head_matches = match (&states[0].clip, default_clip.as_ref()) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if !head_matches {
        states[0].clip = default_clip.clone();
    }

    for state in states.iter_mut().skip(1) {
        state.default_state = false;
    }

    let mut names: Vec<String> = Vec::with_capacity(states.len());
    for state in states.iter_mut() {
        if state.name.is_empty() {
            if let Some(clip) = state.clip.as_ref() {
                state.name = clip.name().to_string();
            }
        }
        state.name = unique_name(names.iter().map(String::as_str), &state.name);
        names.push(state.name.clone());

        if let Some(clip) = state.clip.as_ref() {
            if clip.is_legacy_format() {
                log::error!(
                    "Animation clip {} in state {} is Legacy. Set clip.legacy to false, or reimport as Generic to use it",
                    clip.name(),
                    state.name
                );
                state.clip = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NamedClip(&'static str, bool);

    impl Clip for NamedClip {
        fn name(&self) -> &str {
            self.0
        }
        fn length(&self) -> f32 {
            1.0
        }
        fn is_legacy_format(&self) -> bool {
            self.1
        }
    }

    fn clip(name: &'static str) -> ClipRef<NamedClip> {
        Arc::new(NamedClip(name, false))
    }

    #[test]
    fn empty_list_gets_default_entry() {
        let idle = clip("idle");
        let mut default_clip = Some(idle.clone());
        let mut states: Vec<EditorState<NamedClip>> = Vec::new();
        validate_editor_states(&mut default_clip, &mut states);
        assert_eq!(states.len(), 1);
        assert!(states[0].default_state);
        assert_eq!(states[0].name, DEFAULT_STATE_NAME);
        assert!(Arc::ptr_eq(states[0].clip.as_ref().unwrap(), &idle));
    }

    #[test]
    fn default_is_pushed_to_front_and_unique() {
        let mut default_clip = Some(clip("idle"));
        let mut stray = EditorState::new(Some(clip("walk")), "Walk");
        stray.default_state = true;
        let mut states = vec![stray, EditorState::new(Some(clip("run")), "Walk")];
        validate_editor_states(&mut default_clip, &mut states);

        let names: Vec<_> = states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Default", "Walk", "Walk (1)"]);
        assert_eq!(states.iter().filter(|s| s.default_state).count(), 1);
    }

    #[test]
    fn unnamed_entries_take_clip_name_and_legacy_is_nulled() {
        let mut default_clip = Some(Arc::new(NamedClip("ancient", true)));
        let mut states = vec![
            EditorState::default_for(None),
            EditorState::new(Some(clip("jump")), ""),
            EditorState::new(Some(Arc::new(NamedClip("old", true))), "Old"),
        ];
        validate_editor_states(&mut default_clip, &mut states);
        assert!(default_clip.is_none());
        assert_eq!(states[1].name, "jump");
        assert!(states[2].clip.is_none());
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn snapshot_resolves_through_resolver() {
        let jump = clip("jump");
        let snap = StateSnapshot {
            name: "Jump".into(),
            clip_ref: Some("jump".into()),
            is_default: false,
        };
        let mut resolver = |r: &str| if r == "jump" { Some(jump.clone()) } else { None };
        let state = snap.resolve(&mut resolver);
        assert!(Arc::ptr_eq(state.clip.as_ref().unwrap(), &jump));

        let missing = StateSnapshot {
            clip_ref: Some("nope".into()),
            ..snap
        };
        assert!(missing.resolve(&mut resolver).clip.is_none());
    }
}
