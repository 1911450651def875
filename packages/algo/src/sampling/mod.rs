//! Random Sampling
//!
//! Seeded random sources and the draws the estimators need:
//! - Beta draws (Bayesian prior) through two Gamma draws
//! - Categorical draws (ZPDES trace selection)
//!
//! Gamma sampling uses the Marsaglia-Tsang method with the shape < 1 boost,
//! bounded by an iteration cap and a recursion cap.

use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::types::EPSILON;

// ==================== Constants ====================

/// Maximum iterations for Gamma sampling to prevent infinite loops
const MAX_GAMMA_ITERATIONS: usize = 1000;

/// Maximum recursion depth for Gamma sampling
const MAX_GAMMA_RECURSION: usize = 10;

// ==================== Random Source ====================

/// ChaCha8 generator from an explicit seed, or from system time when absent
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    let seed = seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    });
    ChaCha8Rng::seed_from_u64(seed)
}

// ==================== Distributions ====================

/// Sample from Beta(alpha, beta) as Gamma(alpha) / (Gamma(alpha) + Gamma(beta))
pub fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    let a = alpha.max(EPSILON);
    let b = beta.max(EPSILON);

    let x = sample_gamma(rng, a, 1.0, 0);
    let y = sample_gamma(rng, b, 1.0, 0);

    let sum = x + y;
    if sum > 0.0 && sum.is_finite() {
        x / sum
    } else {
        // Fall back to the prior mean
        a / (a + b)
    }
}

/// Sample from Gamma(shape, scale)
///
/// Reference: Marsaglia, G., & Tsang, W. W. (2000).
/// "A simple method for generating gamma variables."
fn sample_gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64, scale: f64, depth: usize) -> f64 {
    if shape <= 0.0 {
        return 0.0;
    }

    if depth >= MAX_GAMMA_RECURSION {
        return shape * scale;
    }

    if shape < 1.0 {
        let u: f64 = rng.gen();
        return sample_gamma(rng, 1.0 + shape, scale, depth + 1) * u.max(EPSILON).powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    for _ in 0..MAX_GAMMA_ITERATIONS {
        let x = sample_normal(rng);
        let v_term = 1.0 + c * x;
        if v_term <= 0.0 {
            continue;
        }

        let v = v_term.powi(3);
        let u: f64 = rng.gen();
        let x2 = x * x;

        // Fast acceptance check
        if u < 1.0 - 0.0331 * x2 * x2 {
            return d * v * scale;
        }

        // Precise acceptance check
        if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return d * v * scale;
        }
    }

    shape * scale
}

/// Standard normal via Box-Muller
fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(EPSILON);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Draw an index proportionally to `weights`
///
/// Degenerate weights (all zero, negative or non-finite) fall back to a
/// uniform draw. Returns `None` only for an empty slice.
pub fn sample_categorical<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    match WeightedIndex::new(weights) {
        Ok(dist) => Some(dist.sample(rng)),
        Err(_) => Some(rng.gen_range(0..weights.len())),
    }
}
