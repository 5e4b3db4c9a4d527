//! Blur pyramid generation.
//!
//! Given a source image and a maximum blur radius, produces an ordered list
//! of progressively blurred keyframes. Radius spacing follows an ease-out
//! power curve so keyframes bunch near the sharp end, where a defocus
//! transition is perceptually busiest. Filtering runs as a two-pass separable
//! Gaussian on a dedicated off-screen GPU device at a reduced resolution;
//! results are read back and upsampled to the source size.
//!
//! Every failure path degrades to an empty [`KeyframeSet`]: callers treat an
//! empty set as "no blur available", never as a hard error.

mod gpu;
mod kernel;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, warn};

use gpu::BlurContext;
pub use kernel::{gaussian_weights, WeightCache};

/// Target spacing between keyframe radii, in source pixels.
pub const PIXELS_PER_STEP: f32 = 40.0;

/// Hard cap on keyframes per pyramid (GPU memory and readback cost).
pub const MAX_KEYFRAMES: usize = 8;

/// Ease-out exponent for radius spacing; larger values bunch keyframes
/// tighter near the sharp end.
pub const SPACING_EXPONENT: f32 = 1.8;

/// Integer factor by which the source is downsampled before filtering.
/// Blur output does not need full-resolution precision, and the factor
/// divides per-pixel convolution cost by its square.
pub const DOWNSAMPLE_FACTOR: u32 = 4;

/// One precomputed blur level.
pub struct BlurKeyframe {
    pub image: RgbaImage,
    /// Blur radius in source pixels this level was filtered at.
    pub radius: f32,
}

/// Ordered blur levels with strictly increasing radii.
#[derive(Default)]
pub struct KeyframeSet {
    frames: Vec<BlurKeyframe>,
}

impl KeyframeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[BlurKeyframe] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Computes the keyframe radii for `max_radius`.
///
/// Count is `clamp(ceil(max_radius / PIXELS_PER_STEP), 1, MAX_KEYFRAMES)`;
/// radius `i` is `max_radius * (i/k)^SPACING_EXPONENT`. Radii are strictly
/// increasing and the last equals `max_radius`.
pub fn plan_radii(max_radius: f32) -> Vec<f32> {
    if !(max_radius >= 1.0) {
        return Vec::new();
    }
    let count = ((max_radius / PIXELS_PER_STEP).ceil() as usize).clamp(1, MAX_KEYFRAMES);
    (1..=count)
        .map(|i| max_radius * (i as f32 / count as f32).powf(SPACING_EXPONENT))
        .collect()
}

/// Owns the off-screen GPU context and weight cache across generations.
///
/// The context is acquired lazily on the first generation and reused for the
/// lifetime of the generator; per-image textures and readback buffers are
/// allocated once per call and dropped when the call returns.
pub struct PyramidGenerator {
    context: Option<BlurContext>,
    weights: WeightCache,
}

impl PyramidGenerator {
    pub fn new() -> Self {
        Self {
            context: None,
            weights: WeightCache::new(),
        }
    }

    /// Generates the blur pyramid for `source` up to `max_radius` pixels.
    ///
    /// Returns an empty set when `max_radius < 1` (no blur needed) or when
    /// any GPU resource acquisition fails; a non-blurred fallback must remain
    /// visually valid, so errors are logged and swallowed here.
    pub fn generate(&mut self, source: &RgbaImage, max_radius: f32) -> KeyframeSet {
        let radii = plan_radii(max_radius);
        if radii.is_empty() {
            return KeyframeSet::empty();
        }

        if self.context_mut().is_none() {
            return KeyframeSet::empty();
        }

        let (src_w, src_h) = source.dimensions();
        let down_w = (src_w / DOWNSAMPLE_FACTOR).max(1);
        let down_h = (src_h / DOWNSAMPLE_FACTOR).max(1);
        let downsampled = imageops::resize(source, down_w, down_h, FilterType::Triangle);

        // Convolution radii are integer pixel counts at the downsampled
        // resolution; sub-pixel detail is intentionally sacrificed.
        let pass_radii: Vec<u32> = radii
            .iter()
            .map(|radius| ((radius / DOWNSAMPLE_FACTOR as f32).round() as u32).max(1))
            .collect();

        let context = self.context.as_mut().expect("context initialized above");
        let rasters = match context.blur_batch(&downsampled, &pass_radii, &mut self.weights) {
            Ok(rasters) => rasters,
            Err(err) => {
                warn!(error = %err, "blur pyramid generation failed; continuing without blur");
                self.context = None;
                return KeyframeSet::empty();
            }
        };

        let frames = rasters
            .into_iter()
            .zip(radii.iter())
            .map(|(raster, &radius)| BlurKeyframe {
                image: imageops::resize(&raster, src_w, src_h, FilterType::Triangle),
                radius,
            })
            .collect::<Vec<_>>();

        debug!(
            keyframes = frames.len(),
            max_radius,
            source_size = format!("{src_w}x{src_h}"),
            "generated blur pyramid"
        );
        KeyframeSet { frames }
    }

    fn context_mut(&mut self) -> Option<&mut BlurContext> {
        if self.context.is_none() {
            match BlurContext::new() {
                Ok(context) => self.context = Some(context),
                Err(err) => {
                    warn!(error = %err, "no off-screen GPU context; blur disabled");
                }
            }
        }
        self.context.as_mut()
    }
}

impl Default for PyramidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_pixel_radius_needs_no_keyframes() {
        assert!(plan_radii(0.0).is_empty());
        assert!(plan_radii(0.9).is_empty());
        assert!(plan_radii(-3.0).is_empty());
        assert!(plan_radii(f32::NAN).is_empty());
    }

    #[test]
    fn radii_are_strictly_increasing_and_end_at_max() {
        for max_radius in [1.0, 17.5, 80.0, 200.0, 1000.0] {
            let radii = plan_radii(max_radius);
            assert!(!radii.is_empty());
            for pair in radii.windows(2) {
                assert!(pair[0] < pair[1], "radii not increasing for {max_radius}");
            }
            let last = *radii.last().unwrap();
            assert!((last - max_radius).abs() < 1e-3);
        }
    }

    #[test]
    fn spacing_matches_the_power_curve() {
        // 200px max radius at 40px per step gives five keyframes following
        // 200 * (i/5)^1.8.
        let radii = plan_radii(200.0);
        assert_eq!(radii.len(), 5);
        for (index, radius) in radii.iter().enumerate() {
            let i = (index + 1) as f32;
            let expected = 200.0 * (i / 5.0).powf(SPACING_EXPONENT);
            assert!((radius - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn keyframe_count_is_capped() {
        let radii = plan_radii(40.0 * (MAX_KEYFRAMES as f32 + 10.0));
        assert_eq!(radii.len(), MAX_KEYFRAMES);
    }
}
