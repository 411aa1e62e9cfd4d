//! Reference skeletal evaluator.
//!
//! Clips hold per-joint TRS keyframes at normalized stamps; sampling is
//! linear for translation/scale and nlerp for rotation. Mixing accumulates
//! weighted TRS per joint, filling any missing weight with the bind pose.

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, PoseEvaluator, WrapMode};
use crate::error::AnimationError;

/// Local transform of one joint. Rotation is a unit quaternion `[x, y, z, w]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointTransform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl JointTransform {
    pub const IDENTITY: JointTransform = JointTransform {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub joints: Vec<JointTransform>,
}

impl Pose {
    pub fn bind(joint_count: usize) -> Self {
        Self {
            joints: vec![JointTransform::IDENTITY; joint_count],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    /// Normalized time in [0, 1].
    pub stamp: f32,
    pub value: JointTransform,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointTrack {
    pub joint: usize,
    pub keys: Vec<TransformKey>,
}

/// Keyframed skeletal clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkeletalClip {
    pub name: String,
    /// Seconds.
    pub length: f32,
    #[serde(default)]
    pub wrap_mode: WrapMode,
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub tracks: Vec<JointTrack>,
}

impl SkeletalClip {
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
            wrap_mode: WrapMode::Default,
            legacy: false,
            tracks: Vec::new(),
        }
    }

    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    pub fn with_track(mut self, joint: usize, keys: Vec<(f32, JointTransform)>) -> Self {
        self.tracks.push(JointTrack {
            joint,
            keys: keys
                .into_iter()
                .map(|(stamp, value)| TransformKey { stamp, value })
                .collect(),
        });
        self
    }

    /// Parse a clip from JSON; keys are sorted by stamp.
    pub fn from_json(json: &str) -> Result<Self, AnimationError> {
        let mut clip: SkeletalClip = serde_json::from_str(json)?;
        for track in &mut clip.tracks {
            track
                .keys
                .sort_by(|a, b| a.stamp.total_cmp(&b.stamp));
        }
        Ok(clip)
    }
}

impl Clip for SkeletalClip {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> f32 {
        self.length
    }

    fn wrap_mode(&self) -> WrapMode {
        self.wrap_mode
    }

    fn is_legacy_format(&self) -> bool {
        self.legacy
    }
}

#[inline]
fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let mag = dot4(q, q).sqrt();
    if mag <= f32::EPSILON {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

/// Shortest-arc normalized lerp.
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize_quat([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

fn lerp_transform(a: &JointTransform, b: &JointTransform, t: f32) -> JointTransform {
    JointTransform {
        translation: lerp3(a.translation, b.translation, t),
        rotation: nlerp_quat(a.rotation, b.rotation, t),
        scale: lerp3(a.scale, b.scale, t),
    }
}

/// Find the segment containing `u`, returning (left, right, local_t).
fn find_segment(keys: &[TransformKey], u: f32) -> (usize, usize, f32) {
    let n = keys.len();
    if n <= 1 || u <= keys[0].stamp {
        return (0, 0, 0.0);
    }
    if u >= keys[n - 1].stamp {
        return (n - 1, n - 1, 0.0);
    }
    // keys[0].stamp < u < keys[n-1].stamp, so the partition point is in 1..n.
    let right = keys.partition_point(|k| k.stamp <= u).clamp(1, n - 1);
    let left = right - 1;
    let span = (keys[right].stamp - keys[left].stamp).max(f32::EPSILON);
    (left, right, ((u - keys[left].stamp) / span).clamp(0.0, 1.0))
}

/// Sample one track at normalized time `u`.
pub fn sample_joint_track(track: &JointTrack, u: f32) -> Option<JointTransform> {
    if track.keys.is_empty() {
        return None;
    }
    let (left, right, t) = find_segment(&track.keys, u.clamp(0.0, 1.0));
    if left == right {
        return Some(track.keys[left].value);
    }
    Some(lerp_transform(
        &track.keys[left].value,
        &track.keys[right].value,
        t,
    ))
}

#[derive(Clone, Debug)]
struct JointAccum {
    t_sum: [f32; 3],
    r_sum: [f32; 4],
    s_sum: [f32; 3],
    w: f32,
}

impl JointAccum {
    fn empty() -> Self {
        Self {
            t_sum: [0.0; 3],
            r_sum: [0.0; 4],
            s_sum: [0.0; 3],
            w: 0.0,
        }
    }

    fn add(&mut self, joint: &JointTransform, reference: [f32; 4], w: f32) {
        // Keep every rotation on the reference hemisphere before summing.
        let mut r = joint.rotation;
        if dot4(r, reference) < 0.0 {
            r = [-r[0], -r[1], -r[2], -r[3]];
        }
        for i in 0..3 {
            self.t_sum[i] += joint.translation[i] * w;
            self.s_sum[i] += joint.scale[i] * w;
        }
        for i in 0..4 {
            self.r_sum[i] += r[i] * w;
        }
        self.w += w;
    }

    fn finalize(self) -> JointTransform {
        let w = self.w.max(f32::EPSILON);
        JointTransform {
            translation: [self.t_sum[0] / w, self.t_sum[1] / w, self.t_sum[2] / w],
            rotation: normalize_quat(self.r_sum),
            scale: [self.s_sum[0] / w, self.s_sum[1] / w, self.s_sum[2] / w],
        }
    }
}

/// Evaluator for [`SkeletalClip`]s over a fixed bind pose.
#[derive(Clone, Debug)]
pub struct SkeletalEvaluator {
    bind_pose: Pose,
}

impl SkeletalEvaluator {
    pub fn new(bind_pose: Pose) -> Self {
        Self { bind_pose }
    }

    /// Identity bind pose with `joint_count` joints.
    pub fn with_joints(joint_count: usize) -> Self {
        Self::new(Pose::bind(joint_count))
    }

    pub fn joint_count(&self) -> usize {
        self.bind_pose.joints.len()
    }
}

impl PoseEvaluator for SkeletalEvaluator {
    type Clip = SkeletalClip;
    type Pose = Pose;

    /// Joints without a track keep their bind transform.
    fn evaluate(&mut self, clip: &SkeletalClip, normalized_time: f32) -> Pose {
        let mut pose = self.bind_pose.clone();
        for track in &clip.tracks {
            let Some(slot) = pose.joints.get_mut(track.joint) else {
                continue;
            };
            if let Some(value) = sample_joint_track(track, normalized_time) {
                *slot = value;
            }
        }
        pose
    }

    /// Total weight below one is topped up with the bind pose; above one the
    /// contributions are normalized.
    fn mix(&mut self, weighted: &[(Pose, f32)]) -> Pose {
        let total: f32 = weighted.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            return self.bind_pose.clone();
        }

        let joints = self.bind_pose.joints.len();
        let mut accum = vec![JointAccum::empty(); joints];
        for (j, slot) in accum.iter_mut().enumerate() {
            let reference = self.bind_pose.joints[j].rotation;
            for (pose, w) in weighted {
                if *w <= 0.0 {
                    continue;
                }
                let joint = pose.joints.get(j).unwrap_or(&self.bind_pose.joints[j]);
                slot.add(joint, reference, *w);
            }
            if total < 1.0 {
                slot.add(&self.bind_pose.joints[j], reference, 1.0 - total);
            }
        }

        Pose {
            joints: accum.into_iter().map(JointAccum::finalize).collect(),
        }
    }

    fn bind_pose(&mut self) -> Pose {
        self.bind_pose.clone()
    }
}
