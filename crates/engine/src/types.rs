use std::time::Duration;

/// Maximum number of simultaneously tracked touch points.
///
/// The composite shader carries a fixed-size uniform array, so the pool and
/// the shader must agree on this cap. Extra contacts are silently dropped.
pub const MAX_TOUCH_POINTS: usize = 5;

/// An sRGB color with 8-bit channels, as stored in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Per-channel linear interpolation at `t` in `[0, 1]`.
    ///
    /// Deliberately not color-space aware; duotone transitions lerp the raw
    /// channel bytes in lock-step with the shared opacity animator.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Normalized channel triple for uniform upload.
    pub fn to_vec3(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Blend operator applied when compositing the duotone layer over the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    SoftLight,
    Screen,
}

impl BlendMode {
    /// Stable index understood by the composite shader.
    pub(crate) fn shader_index(self) -> u32 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::SoftLight => 1,
            BlendMode::Screen => 2,
        }
    }
}

/// Two-tone tint settings: shadows map toward `dark`, highlights toward `light`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuotoneSettings {
    pub light: Color,
    pub dark: Color,
    /// Layer opacity in `[0, 1]`; 0 disables the tint entirely.
    pub opacity: f32,
    pub blend: BlendMode,
    /// Keep the tint applied even while the image is otherwise undimmed.
    pub always_on: bool,
}

impl Default for DuotoneSettings {
    fn default() -> Self {
        Self {
            light: Color::WHITE,
            dark: Color::BLACK,
            opacity: 0.0,
            blend: BlendMode::Normal,
            always_on: false,
        }
    }
}

/// Film grain overlay settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainSettings {
    pub enabled: bool,
    /// Strength of the noise overlay in `[0, 1]`.
    pub amount: f32,
    /// Noise cell size in surface pixels; larger values give coarser grain.
    pub scale: f32,
}

impl Default for GrainSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 0.08,
            scale: 2.0,
        }
    }
}

/// Finger-triggered chromatic aberration settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AberrationSettings {
    pub enabled: bool,
    /// Global effect strength in `[0, 1]`, multiplied into each point's fade.
    pub strength: f32,
    /// How long a released touch point takes to fade out.
    pub fade: Duration,
}

impl Default for AberrationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.6,
            fade: Duration::from_millis(900),
        }
    }
}

/// Identity of one loaded source image plus its GPU resources and blur
/// pyramid. Superseded wholesale on image change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationId(pub u64);

impl GenerationId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// The visual configuration the engine should animate toward.
///
/// Only fields that differ from the previously accepted target start a new
/// animation; matching fields are left untouched so in-flight transitions are
/// never restarted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    pub generation: GenerationId,
    /// Blur pyramid mix fraction in `[0, 1]`.
    pub blur: f32,
    /// Dim amount in `[0, 1]`; 1 is fully black.
    pub dim: f32,
    pub duotone: DuotoneSettings,
    /// Parallax scroll offset in `[0, 1]` across the panning range.
    pub parallax: f32,
    pub grain: GrainSettings,
    pub aberration: AberrationSettings,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            generation: GenerationId(0),
            blur: 0.0,
            dim: 0.0,
            duotone: DuotoneSettings::default(),
            parallax: 0.5,
            grain: GrainSettings::default(),
            aberration: AberrationSettings::default(),
        }
    }
}

impl TargetState {
    /// Clamps every normalized scalar into its legal domain.
    ///
    /// Out-of-range input is corrected rather than rejected; the engine must
    /// never synthesize NaN or out-of-domain visual output from bad external
    /// values.
    pub fn clamped(mut self) -> Self {
        self.blur = sanitize_unit(self.blur);
        self.dim = sanitize_unit(self.dim);
        self.duotone.opacity = sanitize_unit(self.duotone.opacity);
        self.parallax = sanitize_unit(self.parallax);
        self.grain.amount = sanitize_unit(self.grain.amount);
        self.grain.scale = if self.grain.scale.is_finite() {
            self.grain.scale.clamp(0.5, 64.0)
        } else {
            GrainSettings::default().scale
        };
        self.aberration.strength = sanitize_unit(self.aberration.strength);
        self
    }
}

fn sanitize_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Snapshot of every animated touch point, ready for uniform upload.
///
/// `points[i]` packs `(x, y, radius, intensity)` with positions in normalized
/// surface space and intensity already multiplied by the global effect
/// strength.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchSnapshot {
    pub points: [[f32; 4]; MAX_TOUCH_POINTS],
    pub count: usize,
}

/// One fully interpolated visual state, assembled by the synthesizer once per
/// tick and consumed by the compositor. Immutable by convention: the
/// compositor never feeds values back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub generation: GenerationId,
    pub blur: f32,
    pub dim: f32,
    pub duotone_light: Color,
    pub duotone_dark: Color,
    pub duotone_opacity: f32,
    pub duotone_blend: BlendMode,
    pub duotone_always_on: bool,
    pub parallax: f32,
    pub grain: GrainSettings,
    /// Alpha of the current generation over the previous one.
    pub crossfade: f32,
    pub touches: TouchSnapshot,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            generation: GenerationId(0),
            blur: 0.0,
            dim: 0.0,
            duotone_light: Color::WHITE,
            duotone_dark: Color::BLACK,
            duotone_opacity: 0.0,
            duotone_blend: BlendMode::Normal,
            duotone_always_on: false,
            parallax: 0.5,
            grain: GrainSettings::default(),
            crossfade: 1.0,
            touches: TouchSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_lerp_endpoints_and_midpoint() {
        let a = Color::new(0, 100, 200);
        let b = Color::new(100, 200, 0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Color::new(50, 150, 100));
    }

    #[test]
    fn clamping_corrects_out_of_range_scalars() {
        let mut target = TargetState::default();
        target.blur = 1.7;
        target.dim = -0.3;
        target.duotone.opacity = f32::NAN;
        target.grain.scale = f32::INFINITY;
        let clamped = target.clamped();
        assert_eq!(clamped.blur, 1.0);
        assert_eq!(clamped.dim, 0.0);
        assert_eq!(clamped.duotone.opacity, 0.0);
        assert!(clamped.grain.scale.is_finite());
    }
}
