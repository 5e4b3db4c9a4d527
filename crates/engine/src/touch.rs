//! Touch-point decay model feeding the chromatic aberration shader stage.
//!
//! Each contact owns two sub-animators: a short growth animation for its
//! radius on press, and a fade animation for its intensity on release. Points
//! live in a bounded pool sized to the shader's uniform array; once both
//! animators are idle and the point has decayed below epsilon it is garbage
//! collected.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::animator::{Animator, EasingCurve};
use crate::types::{AberrationSettings, TouchSnapshot, MAX_TOUCH_POINTS};

/// Fixed duration of the radius growth animation after a press.
const GROWTH_DURATION: Duration = Duration::from_millis(220);

/// Radius/intensity floor below which a released point is collected.
const DECAY_EPSILON: f32 = 1e-3;

/// Contact phase reported by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

/// One input event in a batch, positions in normalized surface space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub phase: TouchPhase,
}

#[derive(Debug)]
struct TouchPoint {
    id: u64,
    x: f32,
    y: f32,
    radius: Animator,
    intensity: Animator,
    released: bool,
}

impl TouchPoint {
    fn new(id: u64, x: f32, y: f32, now: Instant) -> Self {
        let mut radius = Animator::idle(0.0, EasingCurve::EaseOutQuad);
        radius.retarget(1.0, GROWTH_DURATION, now);
        Self {
            id,
            x,
            y,
            radius,
            intensity: Animator::idle(1.0, EasingCurve::EaseOutQuad),
            released: false,
        }
    }

    fn release(&mut self, fade: Duration, now: Instant) {
        self.released = true;
        self.radius.retarget(0.0, fade, now);
        self.intensity.retarget(0.0, fade, now);
    }

    fn is_decayed(&self) -> bool {
        self.released
            && !self.radius.is_running()
            && !self.intensity.is_running()
            && self.radius.value() <= DECAY_EPSILON
            && self.intensity.value() <= DECAY_EPSILON
    }
}

/// Bounded collection of transient touch-point effects.
pub struct TouchField {
    points: Vec<TouchPoint>,
    settings: AberrationSettings,
}

impl TouchField {
    pub fn new(settings: AberrationSettings) -> Self {
        Self {
            points: Vec::with_capacity(MAX_TOUCH_POINTS),
            settings,
        }
    }

    /// Applies new effect settings; disabling the effect clears every active
    /// point immediately.
    pub fn set_settings(&mut self, settings: AberrationSettings) {
        if !settings.enabled && !self.points.is_empty() {
            trace!(cleared = self.points.len(), "touch effect disabled");
            self.points.clear();
        }
        self.settings = settings;
    }

    /// Consumes one batch of contact events.
    ///
    /// DOWN or MOVE on an unknown (or already released) id creates a new
    /// point, subject to the concurrency cap; excess contacts are dropped
    /// without queueing. UP starts the release animations. A released point
    /// and a fresh point may share an id until the old one decays.
    pub fn apply_events(&mut self, events: &[TouchEvent], now: Instant) {
        if !self.settings.enabled {
            return;
        }
        for event in events {
            let live = self
                .points
                .iter_mut()
                .find(|point| point.id == event.id && !point.released);
            match (event.phase, live) {
                (TouchPhase::Up, Some(point)) => point.release(self.settings.fade, now),
                (TouchPhase::Up, None) => {}
                (_, Some(point)) => {
                    point.x = event.x;
                    point.y = event.y;
                }
                (_, None) => {
                    if self.active_count() < MAX_TOUCH_POINTS {
                        self.points
                            .push(TouchPoint::new(event.id, event.x, event.y, now));
                    }
                }
            }
        }
    }

    /// Advances every point's animators and collects fully decayed points.
    /// Returns whether any point is still animating.
    pub fn tick(&mut self, now: Instant) -> bool {
        for point in &mut self.points {
            point.radius.sample(now);
            point.intensity.sample(now);
        }
        self.points.retain(|point| !point.is_decayed());
        self.points
            .iter()
            .any(|point| point.radius.is_running() || point.intensity.is_running())
    }

    /// Packs the live points into the fixed-size uniform layout, truncated to
    /// the cap, intensities pre-multiplied by the global effect strength.
    ///
    /// Active presses rank ahead of released, fading points: the pool can
    /// briefly exceed the cap while old instances decay, and a fresh contact
    /// must not lose its slot to them.
    pub fn snapshot(&self) -> TouchSnapshot {
        let mut snapshot = TouchSnapshot::default();
        let ordered = self
            .points
            .iter()
            .filter(|point| !point.released)
            .chain(self.points.iter().filter(|point| point.released));
        for point in ordered.take(MAX_TOUCH_POINTS) {
            snapshot.points[snapshot.count] = [
                point.x,
                point.y,
                point.radius.value(),
                point.intensity.value() * self.settings.strength,
            ];
            snapshot.count += 1;
        }
        snapshot
    }

    /// Number of tracked points, including released ones still fading.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn active_count(&self) -> usize {
        self.points.iter().filter(|point| !point.released).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_settings() -> AberrationSettings {
        AberrationSettings {
            enabled: true,
            strength: 1.0,
            fade: Duration::from_millis(400),
        }
    }

    fn down(id: u64) -> TouchEvent {
        TouchEvent {
            id,
            x: 0.5,
            y: 0.5,
            phase: TouchPhase::Down,
        }
    }

    fn up(id: u64) -> TouchEvent {
        TouchEvent {
            id,
            x: 0.5,
            y: 0.5,
            phase: TouchPhase::Up,
        }
    }

    #[test]
    fn down_then_up_eventually_removes_the_point() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        field.apply_events(&[down(1)], t0);
        field.apply_events(&[up(1)], t0);
        assert_eq!(field.len(), 1);

        assert!(field.tick(t0 + Duration::from_millis(100)));
        let animating = field.tick(t0 + Duration::from_secs(2));
        assert!(!animating);
        assert!(field.is_empty(), "decayed point must be collected");
    }

    #[test]
    fn concurrency_cap_drops_excess_contacts() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        let events: Vec<TouchEvent> = (0..(MAX_TOUCH_POINTS as u64 + 3)).map(down).collect();
        field.apply_events(&events, t0);
        assert_eq!(field.len(), MAX_TOUCH_POINTS);
        assert_eq!(field.snapshot().count, MAX_TOUCH_POINTS);
    }

    #[test]
    fn redown_coexists_with_fading_predecessor() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        field.apply_events(&[down(7)], t0);
        field.apply_events(&[up(7)], t0 + Duration::from_millis(50));
        field.apply_events(&[down(7)], t0 + Duration::from_millis(60));
        // Old released instance and the new press share the id.
        assert_eq!(field.len(), 2);
        field.tick(t0 + Duration::from_secs(3));
        // Only the fresh, unreleased point survives.
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn move_updates_position_in_place() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        field.apply_events(&[down(2)], t0);
        field.apply_events(
            &[TouchEvent {
                id: 2,
                x: 0.9,
                y: 0.1,
                phase: TouchPhase::Move,
            }],
            t0,
        );
        assert_eq!(field.len(), 1);
        let snapshot = field.snapshot();
        assert!((snapshot.points[0][0] - 0.9).abs() < 1e-6);
        assert!((snapshot.points[0][1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn disabling_the_effect_clears_all_points() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        field.apply_events(&[down(1), down(2)], t0);
        assert_eq!(field.len(), 2);
        field.set_settings(AberrationSettings {
            enabled: false,
            ..enabled_settings()
        });
        assert!(field.is_empty());
        // Further events are ignored while disabled.
        field.apply_events(&[down(3)], t0);
        assert!(field.is_empty());
    }

    #[test]
    fn fresh_press_outranks_fading_points_in_snapshot() {
        let t0 = Instant::now();
        let mut field = TouchField::new(enabled_settings());
        let downs: Vec<TouchEvent> = (0..MAX_TOUCH_POINTS as u64).map(down).collect();
        field.apply_events(&downs, t0);
        let ups: Vec<TouchEvent> = (0..MAX_TOUCH_POINTS as u64).map(up).collect();
        field.apply_events(&ups, t0 + Duration::from_millis(10));

        // Five released points are still fading; a new press must get a slot.
        field.apply_events(
            &[TouchEvent {
                id: 9,
                x: 0.9,
                y: 0.2,
                phase: TouchPhase::Down,
            }],
            t0 + Duration::from_millis(20),
        );
        field.tick(t0 + Duration::from_millis(30));
        assert_eq!(field.len(), MAX_TOUCH_POINTS + 1);

        let snapshot = field.snapshot();
        assert_eq!(snapshot.count, MAX_TOUCH_POINTS);
        assert!(
            (snapshot.points[0][0] - 0.9).abs() < 1e-6,
            "active press must occupy the first slot"
        );
    }

    #[test]
    fn snapshot_applies_global_strength() {
        let t0 = Instant::now();
        let mut settings = enabled_settings();
        settings.strength = 0.25;
        let mut field = TouchField::new(settings);
        field.apply_events(&[down(1)], t0);
        field.tick(t0);
        let snapshot = field.snapshot();
        assert!(snapshot.points[0][3] <= 0.25 + 1e-6);
    }
}
