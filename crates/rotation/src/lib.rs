//! Wallpaper rotation order over a fixed set of image paths.
//!
//! Continuous mode walks the list in the order given; shuffle mode walks a
//! random permutation and reshuffles on every wrap, never showing the same
//! image twice in a row when more than one is available.

use std::path::{Path, PathBuf};

use paperconfig::RotationMode;
use rand::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("no images to rotate")]
    Empty,
}

pub struct Rotation {
    paths: Vec<PathBuf>,
    order: Vec<usize>,
    cursor: usize,
    mode: RotationMode,
    rng: StdRng,
}

impl Rotation {
    pub fn new(paths: Vec<PathBuf>, mode: RotationMode, seed: u64) -> Result<Self, RotationError> {
        if paths.is_empty() {
            return Err(RotationError::Empty);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let order = build_order(paths.len(), mode, &mut rng);
        Ok(Self {
            paths,
            order,
            cursor: 0,
            mode,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Yields the next path in rotation order, reshuffling on wrap.
    pub fn advance(&mut self) -> &Path {
        if self.cursor >= self.order.len() {
            let previous = *self.order.last().unwrap_or(&0);
            self.order = build_order(self.paths.len(), self.mode, &mut self.rng);
            // A fresh shuffle may start with the image just shown.
            if self.order.len() > 1 && self.order[0] == previous {
                self.order.swap(0, 1);
            }
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        &self.paths[index]
    }
}

fn build_order(len: usize, mode: RotationMode, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    match mode {
        RotationMode::Continuous => {}
        RotationMode::Shuffle => order.shuffle(rng),
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(count: usize) -> Vec<PathBuf> {
        (0..count).map(|i| PathBuf::from(format!("{i}.png"))).collect()
    }

    #[test]
    fn empty_folder_is_rejected() {
        assert!(matches!(
            Rotation::new(Vec::new(), RotationMode::Continuous, 0),
            Err(RotationError::Empty)
        ));
    }

    #[test]
    fn continuous_mode_cycles_in_order() {
        let mut rotation = Rotation::new(paths(3), RotationMode::Continuous, 0).unwrap();
        let seen: Vec<String> = (0..6)
            .map(|_| rotation.advance().display().to_string())
            .collect();
        assert_eq!(seen, ["0.png", "1.png", "2.png", "0.png", "1.png", "2.png"]);
    }

    #[test]
    fn shuffle_mode_covers_every_image_per_wrap() {
        let mut rotation = Rotation::new(paths(8), RotationMode::Shuffle, 42).unwrap();
        let mut seen: Vec<String> = (0..8)
            .map(|_| rotation.advance().display().to_string())
            .collect();
        seen.sort();
        let mut expected: Vec<String> = (0..8).map(|i| format!("{i}.png")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn reshuffle_never_repeats_across_the_wrap() {
        for seed in 0..50 {
            let mut rotation = Rotation::new(paths(4), RotationMode::Shuffle, seed).unwrap();
            let mut last = rotation.advance().to_path_buf();
            for _ in 0..20 {
                let next = rotation.advance().to_path_buf();
                assert_ne!(next, last, "repeat with seed {seed}");
                last = next;
            }
        }
    }

    #[test]
    fn single_image_keeps_repeating() {
        let mut rotation = Rotation::new(paths(1), RotationMode::Shuffle, 7).unwrap();
        for _ in 0..3 {
            assert_eq!(rotation.advance(), Path::new("0.png"));
        }
    }
}
