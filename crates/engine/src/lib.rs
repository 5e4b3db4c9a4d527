//! Animated wallpaper render-state engine.
//!
//! The engine turns discrete state changes (new image, new effect settings,
//! touch input) into smoothly animated frames, and stops drawing entirely
//! once every animation has settled:
//!
//! ```text
//!   settings / image rotation        input events
//!            │ TargetState                │ TouchEvent batch
//!            ▼                            ▼
//!   ┌─────────────────────────────────────────────┐
//!   │             StateSynthesizer                │
//!   │  easing animators · parallax chase · touch  │
//!   └──────────────────────┬──────────────────────┘
//!                          │ VisualState + liveness
//!                          ▼
//!   ┌────────────────┐   ┌──────────────────────┐
//!   │ PyramidGenerator│──▶│      Compositor      │──▶ surface
//!   │ (worker thread) │   │ blur mix · crossfade │
//!   └────────────────┘   └──────────────────────┘
//! ```
//!
//! [`window::run`] wires the pieces together behind a winit event loop;
//! embedders with their own loop can drive [`synth::StateSynthesizer`] and
//! [`compositor::Compositor`] directly.

pub mod animator;
pub mod compositor;
pub mod context;
pub mod handoff;
pub mod pyramid;
pub mod synth;
pub mod touch;
pub mod types;
pub mod window;

pub use compositor::{keyframe_blend, BlendPlan, Compositor, ImageGeneration};
pub use pyramid::{BlurKeyframe, KeyframeSet, PyramidGenerator};
pub use synth::{StateSynthesizer, TickResult};
pub use touch::{TouchEvent, TouchPhase};
pub use types::{
    AberrationSettings, BlendMode, Color, DuotoneSettings, GenerationId, GrainSettings,
    TargetState, TouchSnapshot, VisualState, MAX_TOUCH_POINTS,
};
pub use window::{EngineConfig, ImageSource};
