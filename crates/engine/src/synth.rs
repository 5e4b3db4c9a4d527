//! The render-state synthesizer.
//!
//! Owns one animator per visual property, accepts a new [`TargetState`] at
//! any time, diffuses the delta across the affected animators, and on each
//! tick produces a single consistent [`VisualState`] snapshot plus a liveness
//! flag. The flow mirrors the overall engine:
//!
//! ```text
//!   settings / selection layer
//!            │ TargetState
//!            ▼
//!   StateSynthesizer::update_target ──▶ per-property animators
//!            │                                  │
//!   tick() once per frame ◀─────────────────────┘
//!            │ VisualState + liveness
//!            ▼
//!        Compositor
//! ```
//!
//! Liveness drives redraw scheduling: once nothing animates, the host stops
//! requesting frames until an external state change arrives.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::animator::{Animator, EasingCurve, Smoothed};
use crate::touch::{TouchEvent, TouchField};
use crate::types::{BlendMode, Color, TargetState, VisualState};

/// Transition duration used by newly started property animators.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(600);

/// Time constant of the parallax chase.
const PARALLAX_TIME_CONSTANT: Duration = Duration::from_millis(120);

/// Compound duotone transition: one progress animator drives light color,
/// dark color, and opacity in lock-step so they can never desynchronize.
struct DuotoneTransition {
    progress: Animator,
    from: (Color, Color, f32),
    to: (Color, Color, f32),
    blend: BlendMode,
    always_on: bool,
}

impl DuotoneTransition {
    fn resting(light: Color, dark: Color, opacity: f32) -> Self {
        Self {
            progress: Animator::idle(1.0, EasingCurve::EaseOutQuad),
            from: (light, dark, opacity),
            to: (light, dark, opacity),
            blend: BlendMode::default(),
            always_on: false,
        }
    }

    fn begin(&mut self, to: (Color, Color, f32), duration: Duration, now: Instant) {
        self.from = self.derived();
        self.to = to;
        self.progress.snap(0.0);
        self.progress.retarget(1.0, duration, now);
    }

    /// Light, dark, and opacity at the current progress fraction.
    fn derived(&self) -> (Color, Color, f32) {
        let p = self.progress.value();
        (
            self.from.0.lerp(self.to.0, p),
            self.from.1.lerp(self.to.1, p),
            self.from.2 + (self.to.2 - self.from.2) * p,
        )
    }
}

/// Outcome of one synthesizer tick.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    /// The assembled snapshot for this frame.
    pub state: VisualState,
    /// True while any animator (touch points included) is still in motion, or
    /// a forced update demands one more frame. Callers should request another
    /// redraw iff this is set.
    pub animating: bool,
    /// One-shot edge raised on the first tick at which the image-relevant
    /// animations (blur and crossfade) have just gone idle. External image
    /// selection uses it to know a new source can be swapped in without
    /// visible interruption.
    pub image_ready: bool,
}

pub struct StateSynthesizer {
    duration: Duration,
    target: TargetState,
    blur: Animator,
    dim: Animator,
    crossfade: Animator,
    parallax: Smoothed,
    duotone: DuotoneTransition,
    touches: TouchField,
    force_update: bool,
    image_anims_were_active: bool,
    last_state: VisualState,
}

impl StateSynthesizer {
    pub fn new(initial: TargetState) -> Self {
        let initial = initial.clamped();
        let mut duotone = DuotoneTransition::resting(
            initial.duotone.light,
            initial.duotone.dark,
            initial.duotone.opacity,
        );
        duotone.blend = initial.duotone.blend;
        duotone.always_on = initial.duotone.always_on;
        Self {
            duration: DEFAULT_TRANSITION,
            blur: Animator::idle(initial.blur, EasingCurve::EaseOutQuad),
            dim: Animator::idle(initial.dim, EasingCurve::EaseOutQuad),
            crossfade: Animator::idle(1.0, EasingCurve::EaseOutQuad),
            parallax: Smoothed::new(initial.parallax, PARALLAX_TIME_CONSTANT),
            duotone,
            touches: TouchField::new(initial.aberration),
            target: initial,
            force_update: true,
            image_anims_were_active: false,
            last_state: VisualState::default(),
        }
    }

    /// Updates the duration used by all *newly started* easing animators;
    /// in-flight animators keep the duration they started with.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// The most recently accepted target.
    pub fn target(&self) -> &TargetState {
        &self.target
    }

    /// Accepts a new target state, (re)starting animators only for the
    /// fields that actually changed. A call identical to the current target
    /// is a no-op apart from the forced-redraw flag.
    pub fn update_target(&mut self, new_target: TargetState, now: Instant) {
        let new_target = new_target.clamped();
        // Even a no-op call forces one recomputed snapshot so that toggles
        // with no numeric delta still reach the compositor.
        self.force_update = true;

        if new_target.blur != self.target.blur {
            self.blur.retarget(new_target.blur, self.duration, now);
        }
        if new_target.dim != self.target.dim {
            self.dim.retarget(new_target.dim, self.duration, now);
        }
        if new_target.duotone.light != self.target.duotone.light
            || new_target.duotone.dark != self.target.duotone.dark
            || new_target.duotone.opacity != self.target.duotone.opacity
        {
            self.duotone.begin(
                (
                    new_target.duotone.light,
                    new_target.duotone.dark,
                    new_target.duotone.opacity,
                ),
                self.duration,
                now,
            );
        }
        self.duotone.blend = new_target.duotone.blend;
        self.duotone.always_on = new_target.duotone.always_on;

        // Parallax chases a moving target instead of easing to a fixed
        // endpoint; it has to stay continuous under drag and fling.
        if new_target.parallax != self.target.parallax {
            self.parallax.set_target(new_target.parallax);
        }

        if new_target.aberration != self.target.aberration {
            self.touches.set_settings(new_target.aberration);
        }

        if new_target.generation != self.target.generation {
            if self.crossfade.is_running() {
                // A rapid successive image change continues from the current
                // fade progress instead of popping back to zero.
                self.crossfade.retarget(1.0, self.duration, now);
            } else {
                self.crossfade.snap(0.0);
                self.crossfade.retarget(1.0, self.duration, now);
            }
            debug!(
                from = self.target.generation.0,
                to = new_target.generation.0,
                "image generation change; crossfade started"
            );
        }

        self.target = new_target;
    }

    /// Marshalled touch batch intake; call on the render thread only.
    pub fn apply_touches(&mut self, events: &[TouchEvent], now: Instant) {
        self.touches.apply_events(events, now);
        if !events.is_empty() {
            self.force_update = true;
        }
    }

    /// Advances every owned animator by one frame and assembles the snapshot.
    ///
    /// Safe to call every frame even when nothing changed; an idle tick is
    /// cheap and returns `animating = false`.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        let blur = self.blur.sample(now);
        let dim = self.dim.sample(now);
        let crossfade = self.crossfade.sample(now);
        let parallax = self.parallax.tick(now);
        self.duotone.progress.sample(now);
        let (light, dark, opacity) = self.duotone.derived();
        let touches_animating = self.touches.tick(now);

        let state = VisualState {
            generation: self.target.generation,
            blur,
            dim,
            duotone_light: light,
            duotone_dark: dark,
            duotone_opacity: opacity,
            duotone_blend: self.duotone.blend,
            duotone_always_on: self.duotone.always_on,
            parallax,
            grain: self.target.grain,
            crossfade,
            touches: self.touches.snapshot(),
        };
        self.last_state = state;

        let image_anims_active = self.blur.is_running() || self.crossfade.is_running();
        let image_ready = self.image_anims_were_active && !image_anims_active;
        self.image_anims_were_active = image_anims_active;
        if image_ready {
            trace!(generation = state.generation.0, "image animations settled");
        }

        let animating = image_anims_active
            || self.dim.is_running()
            || self.duotone.progress.is_running()
            || !self.parallax.is_settled()
            || touches_animating
            || self.force_update;
        self.force_update = false;

        TickResult {
            state,
            animating,
            image_ready,
        }
    }

    /// The snapshot produced by the most recent tick.
    pub fn current_state(&self) -> &VisualState {
        &self.last_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::TouchPhase;
    use crate::types::{DuotoneSettings, GenerationId};

    fn synthesizer() -> (StateSynthesizer, Instant) {
        let now = Instant::now();
        let mut synth = StateSynthesizer::new(TargetState::default());
        synth.set_duration(Duration::from_millis(1000));
        // Drain the initial forced update.
        synth.tick(now);
        (synth, now)
    }

    #[test]
    fn blur_transition_follows_ease_out_quad() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.blur = 1.0;
        synth.update_target(target, t0);

        let mid = synth.tick(t0 + Duration::from_millis(500));
        assert!((mid.state.blur - 0.75).abs() < 1e-4);
        assert!(mid.animating);

        let done = synth.tick(t0 + Duration::from_millis(1000));
        assert!((done.state.blur - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identical_target_is_a_noop_except_forced_redraw() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.blur = 1.0;
        synth.update_target(target, t0);
        synth.tick(t0 + Duration::from_millis(500));

        // Re-submitting the same target must not restart the animation.
        synth.update_target(target, t0 + Duration::from_millis(500));
        let result = synth.tick(t0 + Duration::from_millis(1000));
        assert!(
            (result.state.blur - 1.0).abs() < 1e-6,
            "no-op update restarted the blur animator"
        );

        // The forced-redraw flag still yields exactly one live tick.
        synth.update_target(target, t0 + Duration::from_millis(1100));
        let forced = synth.tick(t0 + Duration::from_millis(1101));
        assert!(forced.animating);
        let settled = synth.tick(t0 + Duration::from_millis(1102));
        assert!(!settled.animating);
    }

    #[test]
    fn liveness_terminates_once_targets_stop_changing() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.blur = 0.8;
        target.dim = 0.4;
        target.generation = GenerationId(1);
        synth.update_target(target, t0);

        let mut now = t0;
        let mut quiet = false;
        for _ in 0..200 {
            now += Duration::from_millis(16);
            if !synth.tick(now).animating {
                quiet = true;
                break;
            }
        }
        assert!(quiet, "tick never reported idle");
    }

    #[test]
    fn duotone_components_advance_in_lock_step() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.duotone = DuotoneSettings {
            light: Color::new(200, 100, 0),
            dark: Color::new(0, 50, 100),
            opacity: 1.0,
            blend: BlendMode::Screen,
            always_on: true,
        };
        synth.update_target(target, t0);

        let mid = synth.tick(t0 + Duration::from_millis(500)).state;
        // Ease-out quad progress at t=0.5 is 0.75; every derived component
        // must sit at that same fraction.
        let p = 0.75;
        assert!((mid.duotone_opacity - p).abs() < 1e-3);
        assert_eq!(mid.duotone_light, Color::WHITE.lerp(target.duotone.light, p));
        assert_eq!(mid.duotone_dark, Color::BLACK.lerp(target.duotone.dark, p));
        assert_eq!(mid.duotone_blend, BlendMode::Screen);
        assert!(mid.duotone_always_on);
    }

    #[test]
    fn generation_change_fires_ready_edge_exactly_once() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.generation = GenerationId(1);
        synth.update_target(target, t0);

        let mid = synth.tick(t0 + Duration::from_millis(500));
        assert!(mid.state.crossfade < 1.0);
        assert!(!mid.image_ready);

        let done = synth.tick(t0 + Duration::from_millis(1001));
        assert!((done.state.crossfade - 1.0).abs() < 1e-6);
        assert!(done.image_ready, "edge must fire when the fade settles");

        let after = synth.tick(t0 + Duration::from_millis(1100));
        assert!(!after.image_ready, "edge must fire only once");
    }

    #[test]
    fn rapid_generation_change_continues_fade_progress() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.generation = GenerationId(1);
        synth.update_target(target, t0);
        let before = synth.tick(t0 + Duration::from_millis(400)).state.crossfade;

        target.generation = GenerationId(2);
        synth.update_target(target, t0 + Duration::from_millis(400));
        let after = synth.tick(t0 + Duration::from_millis(400)).state.crossfade;
        assert!(
            (before - after).abs() < 1e-4,
            "successive image change must not pop the fade back to zero"
        );
    }

    #[test]
    fn touch_batch_feeds_snapshot_and_liveness() {
        let (mut synth, t0) = synthesizer();
        let mut target = *synth.target();
        target.aberration.enabled = true;
        target.aberration.strength = 1.0;
        synth.update_target(target, t0);
        synth.tick(t0);

        synth.apply_touches(
            &[TouchEvent {
                id: 1,
                x: 0.3,
                y: 0.7,
                phase: TouchPhase::Down,
            }],
            t0,
        );
        let result = synth.tick(t0 + Duration::from_millis(50));
        assert!(result.animating);
        assert_eq!(result.state.touches.count, 1);
        assert!(result.state.touches.points[0][2] > 0.0, "radius is growing");
    }
}
