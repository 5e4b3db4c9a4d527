//! Scalar animators backing every animated visual property.
//!
//! Two flavours exist. [`Animator`] interpolates from a start to an end value
//! over a fixed duration through a monotonic easing curve; re-targeting it
//! mid-flight continues from the current interpolated value so the output
//! never snaps. [`Smoothed`] has no end time at all: it chases a moving
//! target with an exponential step, which is what parallax needs to feel
//! continuous under drag.

use std::time::{Duration, Instant};

/// Monotonic easing shape mapping elapsed fraction to progress fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EasingCurve {
    Linear,
    /// Decelerating quad; the default for property transitions.
    #[default]
    EaseOutQuad,
    EaseInOutQuad,
    Smoothstep,
}

impl EasingCurve {
    /// Samples the curve at `t`, clamped to the unit interval.
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            EasingCurve::Linear => clamped,
            EasingCurve::EaseOutQuad => 1.0 - (1.0 - clamped) * (1.0 - clamped),
            EasingCurve::EaseInOutQuad => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    1.0 - 2.0 * (1.0 - clamped) * (1.0 - clamped)
                }
            }
            EasingCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
        }
    }
}

/// Animation phase; `Running` carries everything needed to derive the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimatorState {
    Idle,
    Running {
        start: f32,
        end: f32,
        started_at: Instant,
        duration: Duration,
    },
}

/// Derives the interpolated value for `state` at `now`.
///
/// Pure with respect to its inputs; the [`Animator`] wrapper only adds the
/// cached last sample and the Idle transition.
pub fn value_at(state: &AnimatorState, curve: EasingCurve, now: Instant, idle_value: f32) -> f32 {
    match state {
        AnimatorState::Idle => idle_value,
        AnimatorState::Running {
            start,
            end,
            started_at,
            duration,
        } => {
            let elapsed = now.saturating_duration_since(*started_at);
            if elapsed >= *duration {
                *end
            } else {
                let t = elapsed.as_secs_f32() / duration.as_secs_f32().max(f32::EPSILON);
                start + (end - start) * curve.sample(t)
            }
        }
    }
}

/// Fixed-duration scalar animator modelled as an explicit state machine.
#[derive(Debug, Clone)]
pub struct Animator {
    state: AnimatorState,
    curve: EasingCurve,
    /// Last sampled value; doubles as the start of the next re-target.
    value: f32,
}

impl Animator {
    /// Creates an idle animator resting at `value`.
    pub fn idle(value: f32, curve: EasingCurve) -> Self {
        Self {
            state: AnimatorState::Idle,
            curve,
            value,
        }
    }

    /// The value produced by the most recent [`Animator::sample`] call.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// True while `elapsed < duration`.
    pub fn is_running(&self) -> bool {
        matches!(self.state, AnimatorState::Running { .. })
    }

    /// Starts (or restarts) a transition toward `end`.
    ///
    /// A running animator continues from its current interpolated value, not
    /// its original start; that is what keeps rapid successive target changes
    /// free of visible discontinuities. A zero duration snaps immediately.
    pub fn retarget(&mut self, end: f32, duration: Duration, now: Instant) {
        let start = value_at(&self.state, self.curve, now, self.value);
        self.value = start;
        if duration.is_zero() || (end - start).abs() <= f32::EPSILON {
            self.value = end;
            self.state = AnimatorState::Idle;
            return;
        }
        self.state = AnimatorState::Running {
            start,
            end,
            started_at: now,
            duration,
        };
    }

    /// Forces the animator to rest at `value` without animating.
    pub fn snap(&mut self, value: f32) {
        self.state = AnimatorState::Idle;
        self.value = value;
    }

    /// Advances to `now`, returning the interpolated value and settling into
    /// Idle once the duration has elapsed.
    pub fn sample(&mut self, now: Instant) -> f32 {
        self.value = value_at(&self.state, self.curve, now, self.value);
        if let AnimatorState::Running {
            started_at,
            duration,
            ..
        } = self.state
        {
            if now.saturating_duration_since(started_at) >= duration {
                self.state = AnimatorState::Idle;
            }
        }
        self.value
    }
}

/// Continuous exponential chase toward a moving target.
///
/// The step `1 - exp(-dt / tau)` makes convergence independent of the frame
/// interval: two 8 ms ticks move exactly as far as one 16 ms tick.
#[derive(Debug, Clone)]
pub struct Smoothed {
    value: f32,
    target: f32,
    time_constant: Duration,
    last_tick: Option<Instant>,
}

/// Distance below which a chase counts as settled.
pub const SETTLE_EPSILON: f32 = 1e-3;

impl Smoothed {
    pub fn new(value: f32, time_constant: Duration) -> Self {
        Self {
            value,
            target: value,
            time_constant,
            last_tick: None,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Moves the chase target; the value keeps converging from wherever it is.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// True once the value has converged to within [`SETTLE_EPSILON`].
    pub fn is_settled(&self) -> bool {
        (self.target - self.value).abs() <= SETTLE_EPSILON
    }

    /// Advances the chase to `now` and returns the new value.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        if dt.is_zero() {
            return self.value;
        }
        let tau = self.time_constant.as_secs_f32().max(f32::EPSILON);
        let alpha = 1.0 - (-dt.as_secs_f32() / tau).exp();
        self.value += (self.target - self.value) * alpha;
        if self.is_settled() {
            self.value = self.target;
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_hit_their_endpoints() {
        for curve in [
            EasingCurve::Linear,
            EasingCurve::EaseOutQuad,
            EasingCurve::EaseInOutQuad,
            EasingCurve::Smoothstep,
        ] {
            assert!((curve.sample(0.0) - 0.0).abs() < 1e-6);
            assert!((curve.sample(1.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn curves_increase_monotonically() {
        for curve in [
            EasingCurve::Linear,
            EasingCurve::EaseOutQuad,
            EasingCurve::EaseInOutQuad,
            EasingCurve::Smoothstep,
        ] {
            let mut last = 0.0;
            for step in 0..=20 {
                let sample = curve.sample(step as f32 / 20.0);
                assert!(sample >= last - f32::EPSILON, "{curve:?} regressed");
                last = sample;
            }
        }
    }

    #[test]
    fn ease_out_quad_matches_expected_midpoint() {
        // duration 1000ms, 0 -> 1, sampled at 500ms: ease-out quad gives 0.75.
        let start = Instant::now();
        let mut animator = Animator::idle(0.0, EasingCurve::EaseOutQuad);
        animator.retarget(1.0, Duration::from_millis(1000), start);
        let value = animator.sample(start + Duration::from_millis(500));
        assert!((value - 0.75).abs() < 1e-4);
        assert!(animator.is_running());
    }

    #[test]
    fn animator_starts_at_start_and_ends_at_end() {
        let start = Instant::now();
        let mut animator = Animator::idle(0.2, EasingCurve::Linear);
        animator.retarget(0.8, Duration::from_millis(300), start);
        assert!((animator.sample(start) - 0.2).abs() < 1e-6);
        assert!(animator.is_running());
        let end = animator.sample(start + Duration::from_millis(300));
        assert!((end - 0.8).abs() < 1e-6);
        assert!(!animator.is_running());
        // Past the end the value stays put.
        assert!((animator.sample(start + Duration::from_secs(5)) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn retarget_continues_from_current_value() {
        let start = Instant::now();
        let mut animator = Animator::idle(0.0, EasingCurve::Linear);
        animator.retarget(1.0, Duration::from_millis(1000), start);
        let mid = start + Duration::from_millis(400);
        let before = animator.sample(mid);
        animator.retarget(0.0, Duration::from_millis(1000), mid);
        let after = animator.sample(mid);
        assert!(
            (before - after).abs() < 1e-4,
            "re-target introduced a discontinuity: {before} -> {after}"
        );
    }

    #[test]
    fn zero_duration_snaps() {
        let now = Instant::now();
        let mut animator = Animator::idle(0.0, EasingCurve::EaseOutQuad);
        animator.retarget(0.4, Duration::ZERO, now);
        assert!(!animator.is_running());
        assert!((animator.value() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn smoothing_step_is_frame_rate_independent() {
        let t0 = Instant::now();
        let mut coarse = Smoothed::new(0.0, Duration::from_millis(120));
        let mut fine = Smoothed::new(0.0, Duration::from_millis(120));
        coarse.set_target(1.0);
        fine.set_target(1.0);

        coarse.tick(t0);
        coarse.tick(t0 + Duration::from_millis(32));

        fine.tick(t0);
        fine.tick(t0 + Duration::from_millis(8));
        fine.tick(t0 + Duration::from_millis(16));
        fine.tick(t0 + Duration::from_millis(24));
        fine.tick(t0 + Duration::from_millis(32));

        assert!((coarse.value() - fine.value()).abs() < 1e-3);
    }

    #[test]
    fn smoothing_settles_on_target() {
        let t0 = Instant::now();
        let mut smoothed = Smoothed::new(0.0, Duration::from_millis(100));
        smoothed.set_target(0.6);
        smoothed.tick(t0);
        assert!(!smoothed.is_settled());
        smoothed.tick(t0 + Duration::from_secs(2));
        assert!(smoothed.is_settled());
        assert!((smoothed.value() - 0.6).abs() <= SETTLE_EPSILON);
    }
}
