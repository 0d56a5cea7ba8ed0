//! Utilities for synthesizing cascades and test frames.
//!
//! Nothing here is needed at detection time; the builders exist so tests and
//! benches can fabricate well-formed cascade blobs and deterministic images
//! without shipping binary fixtures.

use rand::prelude::*;
use rand_distr::{Distribution, Normal};

/// One decision tree of a synthetic cascade.
pub struct TreeSpec {
    /// Node tests in heap order (indices `1..2^depth - 1`), four signed
    /// offsets `(dr1, dc1, dr2, dc2)` per node. Must hold `2^depth - 1`
    /// entries.
    pub tests: Vec<[i8; 4]>,
    /// Leaf scores in heap order. Must hold `2^depth` entries.
    pub leaves: Vec<f32>,
    /// Stage rejection threshold.
    pub threshold: f32,
}

/// Serialize trees into the cascade blob format: 8 zeroed header bytes,
/// little-endian depth and tree count, then per tree the packed node tests,
/// leaf scores and stage threshold.
///
/// # Panics
/// If a tree's table sizes disagree with `depth`.
#[must_use]
pub fn encode_cascade_blob(depth: u32, trees: &[TreeSpec]) -> Vec<u8> {
    assert!(depth >= 1, "depth must be positive");
    assert!(!trees.is_empty(), "at least one tree required");
    let pow2 = 1usize << depth;

    let mut blob = Vec::with_capacity(16 + trees.len() * 8 * pow2);
    blob.extend_from_slice(&[0u8; 8]);
    blob.extend_from_slice(&(depth as i32).to_le_bytes());
    blob.extend_from_slice(&(trees.len() as i32).to_le_bytes());

    for tree in trees {
        assert_eq!(tree.tests.len(), pow2 - 1, "wrong test count for depth");
        assert_eq!(tree.leaves.len(), pow2, "wrong leaf count for depth");
        for test in &tree.tests {
            blob.extend(test.iter().map(|&b| b as u8));
        }
        for leaf in &tree.leaves {
            blob.extend_from_slice(&leaf.to_le_bytes());
        }
        blob.extend_from_slice(&tree.threshold.to_le_bytes());
    }
    blob
}

/// A random but structurally valid cascade blob. Thresholds are drawn low
/// enough that a useful fraction of regions survives several stages, which
/// keeps benches representative.
#[must_use]
pub fn random_cascade_blob(depth: u32, ntrees: usize, rng: &mut impl Rng) -> Vec<u8> {
    let pow2 = 1usize << depth;
    let trees: Vec<TreeSpec> = (0..ntrees)
        .map(|_| TreeSpec {
            tests: (0..pow2 - 1)
                .map(|_| std::array::from_fn(|_| rng.gen::<i8>()))
                .collect(),
            leaves: (0..pow2).map(|_| rng.gen_range(-0.6f32..0.6)).collect(),
            threshold: rng.gen_range(-2.0f32..-0.5),
        })
        .collect();
    encode_cascade_blob(depth, &trees)
}

/// A width x height frame filled with one intensity.
#[must_use]
pub fn uniform_image(width: usize, height: usize, value: u8) -> Vec<u8> {
    vec![value; width * height]
}

/// A uniform frame with Gaussian noise, reproducible from `seed`.
///
/// # Panics
/// If `sigma` is not finite and non-negative.
#[must_use]
pub fn noisy_image(width: usize, height: usize, mean: u8, sigma: f32, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(f32::from(mean), sigma).expect("valid noise sigma");
    (0..width * height)
        .map(|_| normal.sample(&mut rng).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// A background-intensity frame with one square patch of a different
/// intensity, top-left corner at `(top, left)`.
#[must_use]
pub fn square_patch_image(
    width: usize,
    height: usize,
    background: u8,
    patch: u8,
    top: usize,
    left: usize,
    size: usize,
) -> Vec<u8> {
    let mut data = vec![background; width * height];
    for y in top..(top + size).min(height) {
        for x in left..(left + size).min(width) {
            data[y * width + x] = patch;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_length_matches_format() {
        let blob = encode_cascade_blob(
            2,
            &[
                TreeSpec {
                    tests: vec![[0, 0, 0, 0]; 3],
                    leaves: vec![0.0; 4],
                    threshold: 0.0,
                },
                TreeSpec {
                    tests: vec![[1, 1, 1, 1]; 3],
                    leaves: vec![1.0; 4],
                    threshold: 1.0,
                },
            ],
        );
        assert_eq!(blob.len(), 16 + 2 * 8 * 4);
    }

    #[test]
    fn test_noisy_image_is_deterministic() {
        let a = noisy_image(32, 32, 128, 10.0, 99);
        let b = noisy_image(32, 32, 128, 10.0, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn test_square_patch_bounds() {
        let data = square_patch_image(8, 8, 200, 30, 6, 6, 4);
        assert_eq!(data[6 * 8 + 6], 30);
        assert_eq!(data[7 * 8 + 7], 30);
        assert_eq!(data[5 * 8 + 5], 200);
    }
}
