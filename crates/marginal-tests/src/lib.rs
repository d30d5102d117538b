//! Shared helpers for the integration suite.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Tolerance for trajectory-equality checks (resumability): the two runs
/// perform the same operations in the same order.
pub const TRAJECTORY_TOL: f64 = 1e-10;

/// Tolerance for converged-equivalence checks (partitioned vs flat).
pub const CONVERGENCE_TOL: f64 = 1e-8;

/// Deterministic synthetic draws from `N(mean, sd²)`.
pub fn synthetic_normal(seed: u64, n: usize, mean: f64, sd: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(mean, sd).expect("valid normal parameters");
    (0..n).map(|_| dist.sample(&mut rng)).collect()
}

/// Splits `data` into consecutive blocks of the given sizes.
pub fn split_into_blocks<T: Clone>(data: &[T], sizes: &[usize]) -> Vec<Vec<T>> {
    let mut blocks = Vec::with_capacity(sizes.len());
    let mut start = 0;
    for &len in sizes {
        blocks.push(data[start..start + len].to_vec());
        start += len;
    }
    assert_eq!(start, data.len(), "block sizes must cover the data");
    blocks
}
