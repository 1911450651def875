//! Numeric Helpers
//!
//! Special functions and small solvers shared by the estimators:
//! - Log-gamma (Lanczos approximation), log-beta and the Beta density, plain and in log space
//! - Composite Simpson integration on a closed interval
//! - Binary entropy and Bernoulli KL divergence in bits
//! - KL upper confidence bound by bisection

use std::f64::consts::{LN_2, PI};

use crate::sanitize::{clamp_open_probability, clamp_probability, finite_or, non_negative};

// ==================== Constants ====================

const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Bisection steps for the KL bound; 2^-60 is below f64 resolution on [0, 1]
const KL_BISECTION_STEPS: usize = 60;

// ==================== Special Functions ====================

/// Natural log of the Gamma function for x > 0
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return (PI / (PI * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let mut series = LANCZOS_COEFFICIENTS[0];
    for (i, &c) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        series += c / (x + i as f64);
    }

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// ln B(a, b) = ln Γ(a) + ln Γ(b) - ln Γ(a + b)
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Log of the Beta(a, b) density at x in the open interval (0, 1)
pub fn ln_beta_pdf(x: f64, a: f64, b: f64) -> f64 {
    if !(x > 0.0 && x < 1.0) || a <= 0.0 || b <= 0.0 {
        return f64::NEG_INFINITY;
    }
    (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln() - ln_beta(a, b)
}

/// Beta(a, b) probability density at x; 0 outside [0, 1]
pub fn beta_pdf(x: f64, a: f64, b: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) || a <= 0.0 || b <= 0.0 {
        return 0.0;
    }

    let density = if x > 0.0 && x < 1.0 {
        ln_beta_pdf(x, a, b).exp()
    } else {
        x.powf(a - 1.0) * (1.0 - x).powf(b - 1.0) / ln_beta(a, b).exp()
    };
    non_negative(finite_or(density, 0.0))
}

/// Composite Simpson rule over [a, b] with `intervals` sub-intervals (rounded up to even)
pub fn integrate_simpson<F>(f: F, a: f64, b: f64, intervals: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = intervals.max(2) + intervals % 2;
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let x = a + i as f64 * h;
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(x);
    }

    sum * h / 3.0
}

// ==================== Information Measures ====================

/// Binary entropy in bits; 0 outside the open interval (0, 1)
pub fn binary_entropy(p: f64) -> f64 {
    if p.is_nan() || p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// KL(Bernoulli(p) || Bernoulli(q)) in bits
pub fn bernoulli_kl_bits(p: f64, q: f64) -> f64 {
    let p = clamp_probability(p);
    let q = clamp_open_probability(q);

    let mut kl = 0.0;
    if p > 0.0 {
        kl += p * (p / q).ln();
    }
    if p < 1.0 {
        kl += (1.0 - p) * ((1.0 - p) / (1.0 - q)).ln();
    }

    non_negative(kl / LN_2)
}

/// Largest u in [p, 1] with KL(p || u) <= radius (bits)
///
/// KL(p || u) is convex in u and increasing on [p, 1], so the feasible set on
/// that side is a single interval and bisection converges to its right end.
pub fn kl_upper_bound(p: f64, radius: f64) -> f64 {
    let p = clamp_probability(p);
    if radius.is_nan() || radius <= 0.0 || p >= 1.0 {
        return p;
    }

    let mut lo = p;
    let mut hi = 1.0;
    for _ in 0..KL_BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if bernoulli_kl_bits(p, mid) <= radius {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    clamp_probability(lo)
}
