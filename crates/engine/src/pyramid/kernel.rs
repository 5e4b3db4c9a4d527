//! Discretized Gaussian kernels for the separable blur passes.

use std::collections::HashMap;
use std::sync::Arc;

/// Builds the one-sided weight vector for an integer pixel radius.
///
/// `weights[0]` is the center tap and `weights[i]` the tap at offset `i`;
/// the shader applies each off-center weight twice (mirrored), so the vector
/// is normalized such that `w[0] + 2 * sum(w[1..])` equals 1.
pub fn gaussian_weights(radius: u32) -> Vec<f32> {
    let radius = radius.max(1);
    let sigma = (radius as f32 / 2.0).max(1.0);
    let mut weights: Vec<f32> = (0..=radius)
        .map(|i| {
            let x = i as f32;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for weight in &mut weights {
        *weight /= sum;
    }
    weights
}

/// Cache of weight vectors keyed by integer radius.
///
/// Weight vectors for the same radius are shared across keyframes and across
/// images; kernels are pure functions of the radius, so entries never expire.
#[derive(Default)]
pub struct WeightCache {
    entries: HashMap<u32, Arc<Vec<f32>>>,
}

impl WeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, radius: u32) -> Arc<Vec<f32>> {
        self.entries
            .entry(radius.max(1))
            .or_insert_with(|| Arc::new(gaussian_weights(radius)))
            .clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
