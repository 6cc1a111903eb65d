//! Seeded class balancing and train/test splitting
//!
//! Each step draws from its own `StdRng` seeded with the same value, so a
//! step's output depends only on its input and the seed.

use crate::errors::{Result, ServiceError};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;

/// Draw `per_class` rows of each class without replacement, epileptic first,
/// then shuffle. Returns raw row indices in pool order.
pub fn balanced_pool(labels: &[u8], per_class: usize, seed: u64) -> Result<Vec<usize>> {
    let mut pool = Vec::with_capacity(per_class * 2);

    for class in [1u8, 0u8] {
        let rows: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();

        if rows.len() < per_class {
            return Err(ServiceError::DatasetError(format!(
                "class {} has {} rows, need {}",
                class,
                rows.len(),
                per_class
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        pool.extend(index::sample(&mut rng, rows.len(), per_class).into_iter().map(|i| rows[i]));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    pool.shuffle(&mut rng);
    Ok(pool)
}

/// Number of test rows for `n` rows at `test_fraction` (rounded up)
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    ((n as f64) * test_fraction).ceil() as usize
}

/// Permute `0..n`; the first `test_size` positions form the test partition.
/// Returns `(train, test)` positions.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut positions: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let n_test = test_size(n, test_fraction).min(n);
    let train = positions.split_off(n_test);
    (train, positions)
}

/// One-hot encode binary labels into `(rows, 2)`
pub fn one_hot(labels: &[u8]) -> Array2<f32> {
    let mut out = Array2::zeros((labels.len(), 2));
    for (i, label) in labels.iter().enumerate() {
        out[[i, usize::from(*label)]] = 1.0;
    }
    out
}
