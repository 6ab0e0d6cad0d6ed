//! Weighted reservoir selection (Efraimidis-Spirakis A-Res)
//!
//! Draws up to n distinct indices with probability monotonically
//! increasing in weight. For a single draw the selection is exactly
//! weight-proportional; for n > 1 it is the standard sequential reservoir
//! bias. Zero and non-finite weights are never selected. One RNG draw is
//! consumed per weight, in slice order, so the outcome is fully
//! determined by the seed and the slice.

use rand::Rng;

/// Select up to `n` distinct indices from `weights`, biased by weight.
pub fn weighted_indices<R: Rng>(rng: &mut R, weights: &[f32], n: usize) -> Vec<usize> {
    if n == 0 || weights.is_empty() {
        return Vec::new();
    }

    // A-Res key: u^(1/w). Equivalent to an exponential race, so larger
    // weights win more often and w = 0 never wins.
    let mut keyed: Vec<(f64, usize)> = Vec::with_capacity(weights.len());
    for (idx, &w) in weights.iter().enumerate() {
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        if w.is_finite() && w > 0.0 {
            keyed.push((u.powf(1.0 / w as f64), idx));
        }
    }

    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    keyed.truncate(n);
    keyed.into_iter().map(|(_, idx)| idx).collect()
}

// ============================================================================
// TESTS
// ============================================================================
