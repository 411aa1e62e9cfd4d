//! Simple Animation Core (engine-agnostic)
//!
//! A component that plays named animation states on one target. States are
//! registered by name, played immediately or crossfaded, queued behind the
//! running transition, and blended by weight into a single pose per tick.
//! Pose sampling and mixing belong to the host through [`PoseEvaluator`];
//! [`skeletal`] provides a reference evaluator over joint transforms.

pub mod animation;
pub mod clip;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod mixer;
pub mod outputs;
pub mod registry;
pub mod skeletal;
pub mod snapshot;
pub mod state;

// Re-exports for hosts
pub use animation::{SimpleAnimation, StateHandle, StateMut, StateView, States};
pub use clip::{Clip, ClipRef, ClipResolver, PoseEvaluator, WrapMode};
pub use config::{AnimationConfig, FadeCurve};
pub use error::AnimationError;
pub use graph::{GraphRunState, LayerMixer};
pub use ids::StateId;
pub use mixer::{MixerPhase, QueueMode, RequestOutcome, TransitionMixer, TransitionMode, TransitionRequest};
pub use outputs::{AnimationEvent, Outputs};
pub use registry::{ClipBinding, ClipRegistry, Registration, DEFAULT_STATE_NAME};
pub use skeletal::{JointTransform, Pose, SkeletalClip, SkeletalEvaluator};
pub use snapshot::{validate_editor_states, EditorState, StateSnapshot};
pub use state::{PlaybackState, StateTable};

pub type Result<T> = core::result::Result<T, AnimationError>;
