//! Data Sanitization
//!
//! Numerical stability utilities.
//!
//! Functions:
//! - Probability clamping
//! - Non-finite value replacement
//! - Probability validity checks

use crate::types::EPSILON;

/// Replace a non-finite value with `fallback`
pub fn finite_or(x: f64, fallback: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        fallback
    }
}

/// Clamp into [0, 1]; NaN becomes 0
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Clamp into the open interval (EPSILON, 1 - EPSILON), for logarithms
pub fn clamp_open_probability(p: f64) -> f64 {
    clamp_probability(p).clamp(EPSILON, 1.0 - EPSILON)
}

/// Non-negative finite value; anything else becomes 0
pub fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        0.0
    }
}

pub fn is_valid_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}
