use std::sync::Arc;

use simple_animation_core::{
    AnimationConfig, AnimationError, AnimationEvent, ClipRef, JointTransform, MixerPhase,
    QueueMode, SimpleAnimation, SkeletalClip, SkeletalEvaluator, StateHandle, WrapMode,
    DEFAULT_STATE_NAME,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// Joint 0 translates along x from 0 to `length`, so x equals local time.
fn ramp_clip(name: &str, length: f32, wrap: WrapMode) -> ClipRef<SkeletalClip> {
    Arc::new(
        SkeletalClip::new(name, length)
            .with_wrap_mode(wrap)
            .with_track(
                0,
                vec![
                    (0.0, JointTransform::from_translation([0.0, 0.0, 0.0])),
                    (1.0, JointTransform::from_translation([length, 0.0, 0.0])),
                ],
            ),
    )
}

fn legacy_clip(name: &str) -> ClipRef<SkeletalClip> {
    let mut clip = SkeletalClip::new(name, 1.0);
    clip.legacy = true;
    Arc::new(clip)
}

fn component(default_clip: Option<ClipRef<SkeletalClip>>) -> SimpleAnimation<SkeletalEvaluator> {
    let mut anim = SimpleAnimation::new(SkeletalEvaluator::with_joints(2), AnimationConfig::default());
    anim.set_clip(default_clip).unwrap();
    anim.initialize();
    anim
}

fn weight(anim: &SimpleAnimation<SkeletalEvaluator>, name: &str) -> f32 {
    let handle = anim.get_state(name).unwrap();
    anim.state(handle).unwrap().weight()
}

fn enabled(anim: &SimpleAnimation<SkeletalEvaluator>, name: &str) -> bool {
    let handle = anim.get_state(name).unwrap();
    anim.state(handle).unwrap().enabled()
}

#[test]
fn initialize_plays_default_clip() {
    let idle = ramp_clip("idle", 2.0, WrapMode::Loop);
    let anim = component(Some(idle.clone()));
    assert!(anim.is_initialized());
    assert!(anim.is_playing());
    assert!(anim.is_state_playing(DEFAULT_STATE_NAME));
    approx(weight(&anim, DEFAULT_STATE_NAME), 1.0, 1e-6);
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    assert!(Arc::ptr_eq(anim.state(handle).unwrap().clip(), &idle));
}

#[test]
fn added_state_is_found_until_removed() {
    let mut anim = component(None);
    let walk = ramp_clip("walk", 1.0, WrapMode::Loop);
    assert!(anim.add_state(walk.clone(), "Walk").unwrap());
    // Same clip, same name: nothing changes.
    assert!(!anim.add_state(walk.clone(), "Walk").unwrap());

    let handle = anim.get_state("Walk").unwrap();
    assert!(Arc::ptr_eq(anim.state(handle).unwrap().clip(), &walk));

    assert!(anim.remove_state("Walk"));
    assert!(anim.get_state("Walk").is_none());
    assert!(!anim.is_valid(handle));
    assert!(anim.state(handle).is_none());
    assert!(!anim.remove_state("Walk"));
}

#[test]
fn legacy_clip_is_rejected_without_changes() {
    let mut anim = component(None);
    let before = anim.clip_count();
    let err = anim.add_state(legacy_clip("old"), "Old").unwrap_err();
    assert!(matches!(err, AnimationError::LegacyClip { ref clip } if clip == "old"));
    assert_eq!(anim.clip_count(), before);
    assert!(anim.get_state("Old").is_none());

    let err = anim.add_clip(legacy_clip("old"), "Old").unwrap_err();
    assert_eq!(err.category(), "validation");
    assert!(anim.set_clip(Some(legacy_clip("older"))).is_err());
    assert!(anim.clip().is_none());
}

#[test]
fn playing_unknown_state_changes_nothing() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();

    let before: Vec<(bool, f32)> = anim
        .get_states()
        .map(|h| {
            let s = anim.state(h).unwrap();
            (s.enabled(), s.weight())
        })
        .collect();

    assert!(!anim.play_state("Nope"));
    assert!(!anim.cross_fade("Nope", 0.3));
    assert!(!anim.blend("Nope", 0.5, 0.3));
    assert!(!anim.stop_state("Nope"));

    let after: Vec<(bool, f32)> = anim
        .get_states()
        .map(|h| {
            let s = anim.state(h).unwrap();
            (s.enabled(), s.weight())
        })
        .collect();
    assert_eq!(before, after);
}

#[test]
fn idle_loop_normalized_time_cycles() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    for n in 1..=5 {
        anim.tick(1.0);
        let expected = (n % 2) as f32 / 2.0;
        approx(anim.state(handle).unwrap().normalized_time(), expected, 1e-5);
    }
    assert!(anim.is_playing());
}

#[test]
fn tick_pose_follows_local_time() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    let out = anim.tick(0.5);
    let pose = out.pose.as_ref().unwrap();
    approx(pose.joints[0].translation[0], 0.5, 1e-5);
    // Untracked joint stays at bind.
    approx(pose.joints[1].translation[0], 0.0, 1e-6);
    approx(pose.joints[1].rotation[3], 1.0, 1e-6);
    approx(pose.joints[1].scale[0], 1.0, 1e-6);
}

#[test]
fn zero_length_crossfade_completes_on_next_tick() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();

    assert!(anim.cross_fade("Walk", 0.0));
    let out = anim.tick(0.1);
    assert!(out.has_event(&AnimationEvent::TransitionFinished {
        state: "Walk".into()
    }));

    approx(weight(&anim, "Walk"), 1.0, 1e-6);
    assert!(enabled(&anim, "Walk"));
    assert!(!enabled(&anim, DEFAULT_STATE_NAME));
    approx(weight(&anim, DEFAULT_STATE_NAME), 0.0, 1e-6);
}

#[test]
fn crossfade_weights_ramp_and_sum_to_one() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    anim.drain_events();

    assert!(anim.cross_fade("Walk", 1.0));
    let out = anim.tick(0.5);
    assert!(out.has_event(&AnimationEvent::TransitionStarted {
        state: "Walk".into()
    }));
    approx(weight(&anim, "Walk"), 0.5, 1e-5);
    approx(weight(&anim, DEFAULT_STATE_NAME), 0.5, 1e-5);

    let mut last_in = weight(&anim, "Walk");
    let mut last_out = weight(&anim, DEFAULT_STATE_NAME);
    for _ in 0..4 {
        anim.tick(0.1);
        let w_in = weight(&anim, "Walk");
        let w_out = weight(&anim, DEFAULT_STATE_NAME);
        assert!(w_in >= last_in);
        assert!(w_out <= last_out);
        approx(w_in + w_out, 1.0, 1e-4);
        last_in = w_in;
        last_out = w_out;
    }
}

#[test]
fn queued_crossfades_run_back_to_back() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("b", 1.0, WrapMode::Loop), "B").unwrap();
    anim.add_state(ramp_clip("c", 1.0, WrapMode::Loop), "C").unwrap();
    anim.drain_events();

    assert!(anim.cross_fade_queued("B", 0.5, QueueMode::Queued));
    assert!(anim.cross_fade_queued("C", 0.5, QueueMode::Queued));

    anim.tick(0.25);
    approx(weight(&anim, "B"), 0.5, 1e-5);
    approx(weight(&anim, DEFAULT_STATE_NAME), 0.5, 1e-5);
    assert!(!enabled(&anim, "C"));
    approx(weight(&anim, "C"), 0.0, 1e-6);

    let out = anim.tick(0.25);
    assert!(out.has_event(&AnimationEvent::TransitionFinished { state: "B".into() }));
    assert!(out.has_event(&AnimationEvent::TransitionStarted { state: "C".into() }));
    approx(weight(&anim, "B"), 1.0, 1e-6);
    assert!(!enabled(&anim, DEFAULT_STATE_NAME));
    assert!(enabled(&anim, "C"));
    approx(weight(&anim, "C"), 0.0, 1e-6);

    anim.tick(0.25);
    approx(weight(&anim, "C"), 0.5, 1e-5);
    approx(weight(&anim, "B"), 0.5, 1e-5);

    anim.tick(0.25);
    approx(weight(&anim, "C"), 1.0, 1e-6);
    assert!(!enabled(&anim, "B"));
}

#[test]
fn play_now_preempts_and_clears_queue() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("b", 1.0, WrapMode::Loop), "B").unwrap();
    anim.add_state(ramp_clip("c", 1.0, WrapMode::Loop), "C").unwrap();

    anim.cross_fade_queued("B", 1.0, QueueMode::Queued);
    anim.cross_fade_queued("C", 1.0, QueueMode::Queued);
    assert!(anim.play_state("B"));

    for _ in 0..5 {
        anim.tick(0.5);
    }
    approx(weight(&anim, "B"), 1.0, 1e-6);
    assert!(!enabled(&anim, "C"));
    assert!(!enabled(&anim, DEFAULT_STATE_NAME));
}

#[test]
fn blend_layers_without_touching_others() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("wave", 1.0, WrapMode::Loop), "Wave")
        .unwrap();

    assert!(anim.blend("Wave", 0.5, 0.0));
    anim.tick(0.1);
    approx(weight(&anim, "Wave"), 0.5, 1e-6);
    approx(weight(&anim, DEFAULT_STATE_NAME), 1.0, 1e-6);
    assert!(enabled(&anim, DEFAULT_STATE_NAME));

    assert!(anim.blend("Wave", 0.0, 0.0));
    anim.tick(0.1);
    assert!(!enabled(&anim, "Wave"));
}

#[test]
fn stop_is_idempotent() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    anim.cross_fade("Walk", 1.0);
    anim.tick(0.3);

    anim.stop();
    let once: Vec<(bool, f32, f32)> = anim
        .get_states()
        .map(|h| {
            let s = anim.state(h).unwrap();
            (s.enabled(), s.weight(), s.time())
        })
        .collect();
    anim.stop();
    let twice: Vec<(bool, f32, f32)> = anim
        .get_states()
        .map(|h| {
            let s = anim.state(h).unwrap();
            (s.enabled(), s.weight(), s.time())
        })
        .collect();

    assert_eq!(once, twice);
    assert!(once.iter().all(|(e, w, t)| !e && *w == 0.0 && *t == 0.0));
}

#[test]
fn done_fires_once_and_rewind_resumes() {
    let mut anim = component(Some(ramp_clip("wave", 1.0, WrapMode::Once)));

    let out = anim.tick(0.6);
    assert!(!out.has_event(&AnimationEvent::Done));
    let out = anim.tick(0.6);
    assert!(out.has_event(&AnimationEvent::Done));
    assert!(!anim.is_playing());
    assert!(!anim.is_state_playing(DEFAULT_STATE_NAME));

    let out = anim.tick(0.6);
    assert!(out.is_empty());

    anim.rewind();
    assert!(anim.is_playing());
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    approx(anim.state(handle).unwrap().time(), 0.0, 1e-6);
    let out = anim.tick(0.1);
    assert!(out.pose.is_some());
    assert!(!out.has_event(&AnimationEvent::Done));
}

#[test]
fn state_setters_kick_a_suspended_graph() {
    let mut anim = component(Some(ramp_clip("wave", 1.0, WrapMode::Once)));
    anim.tick(2.0);
    assert!(!anim.is_playing());

    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    anim.state_mut(handle).unwrap().set_normalized_time(0.25);
    assert!(anim.is_playing());
    let view = anim.state(handle).unwrap();
    approx(view.time(), 0.25, 1e-6);
    assert!(!view.is_finished());
}

#[test]
fn per_state_wrap_mode_overrides_clip() {
    let mut anim = component(Some(ramp_clip("wave", 1.0, WrapMode::Once)));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    anim.state_mut(handle).unwrap().set_wrap_mode(WrapMode::Loop);

    anim.tick(1.5);
    let view = anim.state(handle).unwrap();
    assert_eq!(view.wrap_mode(), WrapMode::Loop);
    assert!(view.is_playing());
    approx(view.time(), 0.5, 1e-5);
    assert!(anim.is_playing());
}

#[test]
fn speed_scales_advance() {
    let mut anim = component(Some(ramp_clip("idle", 4.0, WrapMode::Loop)));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    anim.state_mut(handle).unwrap().set_speed(2.0).set_weight(3.0);
    anim.tick(0.5);
    let view = anim.state(handle).unwrap();
    approx(view.time(), 1.0, 1e-6);
    approx(view.weight(), 1.0, 1e-6);
}

#[test]
fn rename_disambiguates_and_rekeys() {
    let mut anim = component(None);
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    anim.add_state(ramp_clip("run", 1.0, WrapMode::Loop), "Run")
        .unwrap();
    let run = anim.get_state("Run").unwrap();

    let applied = anim.state_mut(run).unwrap().set_name("Walk").unwrap();
    assert_eq!(applied, "Walk (1)");
    assert_eq!(anim.get_state("Walk (1)"), Some(run));
    assert!(anim.get_state("Run").is_none());
    assert_eq!(anim.state(run).unwrap().name(), "Walk (1)");

    let names: Vec<String> = anim
        .get_states()
        .map(|h| anim.state(h).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["Walk", "Walk (1)"]);
}

#[test]
fn remove_clip_requires_a_clip_and_removes_every_binding() {
    let mut anim = component(None);
    let err = anim.remove_clip(None).unwrap_err();
    assert!(matches!(err, AnimationError::MissingClip { .. }));

    let shared = ramp_clip("shared", 1.0, WrapMode::Loop);
    anim.add_state(shared.clone(), "A").unwrap();
    anim.add_state(shared.clone(), "B").unwrap();
    anim.add_state(ramp_clip("other", 1.0, WrapMode::Loop), "C")
        .unwrap();
    let a: StateHandle = anim.get_state("A").unwrap();

    assert!(anim.remove_clip(Some(&shared)).unwrap());
    assert!(anim.get_state("A").is_none());
    assert!(anim.get_state("B").is_none());
    assert!(anim.get_state("C").is_some());
    assert!(!anim.is_valid(a));
    assert!(!anim.remove_clip(Some(&shared)).unwrap());
}

#[test]
fn state_enumeration_is_a_snapshot_in_registration_order() {
    let mut anim = component(Some(ramp_clip("idle", 1.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    anim.add_state(ramp_clip("run", 1.0, WrapMode::Loop), "Run")
        .unwrap();

    let states = anim.get_states();
    assert_eq!(states.len(), 3);
    let restart = states.clone();

    anim.remove_state("Walk");
    let resolved: Vec<Option<String>> = states
        .map(|h| anim.state(h).map(|s| s.name().to_string()))
        .collect();
    assert_eq!(
        resolved,
        vec![Some("Default".to_string()), None, Some("Run".to_string())]
    );
    assert_eq!(restart.count(), 3);
}

#[test]
fn registry_changes_raise_states_rebuilt() {
    let mut anim = component(None);
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    let events = anim.drain_events();
    assert_eq!(events, vec![AnimationEvent::StatesRebuilt { count: 1 }]);

    let names: Vec<&str> = anim.editor_states().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Default", "Walk"]);
}

#[test]
fn set_clip_rebinds_default_state() {
    let mut anim = component(Some(ramp_clip("idle", 1.0, WrapMode::Loop)));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();

    let fresh = ramp_clip("fresh", 2.0, WrapMode::Loop);
    anim.set_clip(Some(fresh.clone())).unwrap();
    assert_eq!(anim.get_state(DEFAULT_STATE_NAME), Some(handle));
    assert!(Arc::ptr_eq(anim.state(handle).unwrap().clip(), &fresh));

    anim.set_clip(None).unwrap();
    assert!(anim.get_state(DEFAULT_STATE_NAME).is_none());
}

#[test]
fn deactivate_and_activate_restart_default() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.tick(0.5);

    anim.deactivate();
    assert!(!anim.is_playing());
    assert!(!enabled(&anim, DEFAULT_STATE_NAME));
    assert!(anim.tick(0.5).pose.is_none());

    anim.activate();
    assert!(anim.is_playing());
    assert!(anim.is_state_playing(DEFAULT_STATE_NAME));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    approx(anim.state(handle).unwrap().time(), 0.0, 1e-6);
}

#[test]
fn play_automatically_off_leaves_states_idle() {
    let mut config = AnimationConfig::default();
    config.play_automatically = false;
    let mut anim = SimpleAnimation::new(SkeletalEvaluator::with_joints(1), config);
    anim.set_clip(Some(ramp_clip("idle", 1.0, WrapMode::Loop)))
        .unwrap();
    anim.initialize();

    assert!(!anim.is_state_playing(DEFAULT_STATE_NAME));
    assert!(!anim.play());
    assert!(anim.play_state(DEFAULT_STATE_NAME));
    assert!(anim.is_state_playing(DEFAULT_STATE_NAME));
}

#[test]
fn teardown_then_initialize_rebuilds_from_editor_list() {
    let mut anim = component(Some(ramp_clip("idle", 1.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    let stale = anim.get_state("Walk").unwrap();

    anim.teardown();
    assert!(!anim.is_initialized());
    assert_eq!(anim.clip_count(), 0);

    anim.initialize();
    assert_eq!(anim.clip_count(), 2);
    let fresh = anim.get_state("Walk").unwrap();
    assert_ne!(fresh, stale);
    assert!(anim.state(stale).is_none());
}

#[test]
fn adding_under_default_name_replaces_primary_clip() {
    let mut anim = component(Some(ramp_clip("idle", 1.0, WrapMode::Loop)));
    let handle = anim.get_state(DEFAULT_STATE_NAME).unwrap();

    let other = ramp_clip("other", 1.0, WrapMode::Loop);
    assert!(anim.add_state(other.clone(), DEFAULT_STATE_NAME).unwrap());
    assert!(!anim.add_state(other.clone(), DEFAULT_STATE_NAME).unwrap());

    assert!(Arc::ptr_eq(anim.clip().unwrap(), &other));
    assert_eq!(anim.get_state(DEFAULT_STATE_NAME), Some(handle));
    assert!(Arc::ptr_eq(anim.state(handle).unwrap().clip(), &other));
    let head = &anim.snapshot()[0];
    assert!(head.is_default);
    assert_eq!(head.clip_ref.as_deref(), Some("other"));
}

#[test]
fn default_state_name_is_reserved_for_renames() {
    let mut anim = component(Some(ramp_clip("idle", 1.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    let default = anim.get_state(DEFAULT_STATE_NAME).unwrap();
    let walk = anim.get_state("Walk").unwrap();

    assert_eq!(anim.state_mut(default).unwrap().set_name("Idle"), None);
    assert_eq!(anim.state_mut(walk).unwrap().set_name(DEFAULT_STATE_NAME), None);

    assert_eq!(anim.get_state(DEFAULT_STATE_NAME), Some(default));
    assert_eq!(anim.get_state("Walk"), Some(walk));
    let defaults = anim.editor_states().iter().filter(|s| s.default_state).count();
    assert_eq!(defaults, 1);
}

#[test]
fn disabling_a_fade_target_drops_its_transition() {
    let mut anim = component(Some(ramp_clip("idle", 2.0, WrapMode::Loop)));
    anim.add_state(ramp_clip("walk", 1.0, WrapMode::Loop), "Walk")
        .unwrap();
    anim.cross_fade("Walk", 1.0);
    anim.tick(0.5);

    let walk = anim.get_state("Walk").unwrap();
    anim.state_mut(walk).unwrap().set_enabled(false);
    assert_eq!(anim.mixer_phase(), MixerPhase::Idle);

    let out = anim.tick(1.0);
    assert!(!out.has_event(&AnimationEvent::TransitionFinished {
        state: "Walk".into()
    }));
    assert!(!out.has_event(&AnimationEvent::Done));
    assert!(anim.is_playing());
    assert!(enabled(&anim, DEFAULT_STATE_NAME));
    approx(weight(&anim, DEFAULT_STATE_NAME), 0.5, 1e-5);
    assert!(!enabled(&anim, "Walk"));
}
