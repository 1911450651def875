//! Bayesian Initial ZPD
//!
//! One-shot belief update over dependency edges:
//! - A single prior p ~ Beta(alpha, beta) is drawn and placed on every
//!   dependency edge (child trace -> prerequisite trace)
//! - Every trace is probed `timeout` times (problems drawn cyclically)
//! - Each edge gets BetaPDF(p) * p^n (1-p)^(timeout-n) / P(E), where the
//!   evidence P(E) is integrated numerically; the ratio is taken in log space
//! - A trace is known once any of its edge posteriors exceeds the threshold
//!
//! The posterior is evaluated at the drawn p only; it is the
//! Beta(n + alpha, timeout - n + beta) density at p, not a conjugate mean.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Result};
use crate::graph::ProgressionGraph;
use crate::numeric::{beta_pdf, integrate_simpson, ln_beta, ln_beta_pdf};
use crate::oracle::{ask, Oracle};
use crate::problems::{validate_problems, ProblemCursor};
use crate::sampling::{sample_beta, seeded_rng};
use crate::sanitize::{clamp_open_probability, clamp_probability};
use crate::types::{Trace, TraceProblems, Zpd};

/// Simpson sub-intervals for the evidence integral
const EVIDENCE_INTERVALS: usize = 2048;

// ==================== Configuration ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Problems asked per trace
    pub timeout: usize,
    /// Beta prior shape alpha
    pub alpha: f64,
    /// Beta prior shape beta
    pub beta: f64,
    /// Posterior above which a trace counts as known
    pub threshold: f64,
    /// Seed for the prior draw; system time when absent
    pub seed: Option<u64>,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            timeout: 6,
            alpha: 1.0,
            beta: 3.0,
            threshold: 0.7,
            seed: None,
        }
    }
}

impl BayesianConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.timeout == 0 {
            return Err(ConfigurationError::invalid("timeout", "must be at least 1"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ConfigurationError::invalid("alpha", format!("{} is not a positive shape", self.alpha)));
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(ConfigurationError::invalid("beta", format!("{} is not a positive shape", self.beta)));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigurationError::invalid("threshold", "must be finite"));
        }
        Ok(())
    }
}

// ==================== Report ====================

/// Belief update on one dependency edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgePosterior {
    pub child: Trace,
    pub parent: Trace,
    pub prior: f64,
    pub likelihood: f64,
    /// Raw posterior density at the prior value
    pub density: f64,
    /// Density clamped to [0, 1], compared against the threshold
    pub posterior: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BayesianReport {
    pub prior: f64,
    pub answers: BTreeMap<Trace, Vec<bool>>,
    pub posteriors: Vec<EdgePosterior>,
    pub known: BTreeSet<Trace>,
    pub zpd: Zpd,
}

// ==================== Estimator ====================

pub struct BayesianEstimator<'a> {
    graph: &'a ProgressionGraph,
    problems: &'a TraceProblems,
    config: BayesianConfig,
}

impl<'a> BayesianEstimator<'a> {
    pub fn new(graph: &'a ProgressionGraph, problems: &'a TraceProblems, config: BayesianConfig) -> Result<Self> {
        config.validate()?;
        validate_problems(graph, problems)?;
        Ok(Self {
            graph,
            problems,
            config,
        })
    }

    pub fn estimate<O: Oracle + ?Sized>(&self, oracle: &mut O) -> Result<BayesianReport> {
        let BayesianConfig {
            timeout,
            alpha,
            beta,
            threshold,
            seed,
        } = self.config;

        let mut rng = seeded_rng(seed);
        let prior = clamp_open_probability(sample_beta(&mut rng, alpha, beta));
        info!(prior, alpha, beta, "drew dependency prior");

        // Reversed edges: child -> (prerequisite -> probability)
        let dependencies = self.graph.dependency_graph();
        let mut edges: BTreeMap<&Trace, BTreeMap<&Trace, f64>> = BTreeMap::new();
        for trace in self.graph.traces() {
            let parents = dependencies.parents(trace).iter().map(|p| (p, prior)).collect();
            edges.insert(trace, parents);
        }

        let mut cursor = ProblemCursor::new(self.problems);
        let mut answers: BTreeMap<Trace, Vec<bool>> = BTreeMap::new();
        for _ in 0..timeout {
            for trace in self.graph.traces() {
                let Some(problem) = cursor.draw(trace) else {
                    continue;
                };
                let correct = ask(oracle, problem)?;
                answers.entry(trace.clone()).or_default().push(correct);
            }
        }
        for (trace, record) in &answers {
            debug!(trace = %trace, ?record, "recorded answers");
        }

        let mut posteriors = Vec::new();
        let mut known = BTreeSet::new();

        for (child, parents) in &edges {
            let n = answers.get(*child).map(|r| r.iter().filter(|c| **c).count()).unwrap_or(0);
            let ln_normaliser = ln_evidence(n, timeout, alpha, beta) - ln_beta(alpha, beta);

            for (parent, &p) in parents {
                let log_likelihood = ln_likelihood(p, n, timeout);
                let likelihood = log_likelihood.exp();
                let density = density_from_log(ln_beta_pdf(p, alpha, beta) + log_likelihood - ln_normaliser);
                let posterior = clamp_probability(density);

                info!(
                    parent = %parent,
                    child = %child,
                    prior = p,
                    likelihood,
                    posterior,
                    "bayesian update"
                );

                if posterior > threshold {
                    known.insert((*child).clone());
                }
                posteriors.push(EdgePosterior {
                    child: (*child).clone(),
                    parent: (*parent).clone(),
                    prior: p,
                    likelihood,
                    density,
                    posterior,
                });
            }
        }

        let zpd = if known.is_empty() {
            self.graph.basic_traces().clone()
        } else {
            frontier(self.graph, &known)
        };
        info!(?zpd, known = known.len(), "generated initial zpd");

        Ok(BayesianReport {
            prior,
            answers,
            posteriors,
            known,
            zpd,
        })
    }
}

/// Bayesian initial ZPD for `oracle`
pub fn bayesian_zpd<O: Oracle + ?Sized>(
    graph: &ProgressionGraph,
    problems: &TraceProblems,
    config: BayesianConfig,
    oracle: &mut O,
) -> Result<Zpd> {
    Ok(BayesianEstimator::new(graph, problems, config)?.estimate(oracle)?.zpd)
}

/// ln ∫₀¹ x^(n+α-1) (1-x)^(timeout-n+β-1) dx
///
/// Simpson's rule runs over the integrand divided by B(a, b), which stays
/// representable for long probe runs. A negative exponent makes the integrand
/// singular at an endpoint, and the integral is taken from the Beta function.
fn ln_evidence(n: usize, timeout: usize, alpha: f64, beta: f64) -> f64 {
    let a = n as f64 + alpha;
    let b = (timeout - n) as f64 + beta;
    let ln_scale = ln_beta(a, b);

    if a >= 1.0 && b >= 1.0 {
        let mass = integrate_simpson(|x| beta_pdf(x, a, b), 0.0, 1.0, EVIDENCE_INTERVALS);
        ln_scale + mass.ln()
    } else {
        ln_scale
    }
}

/// ln p^n (1-p)^(timeout-n) for p in (0, 1)
fn ln_likelihood(p: f64, n: usize, timeout: usize) -> f64 {
    n as f64 * p.ln() + (timeout - n) as f64 * (1.0 - p).ln()
}

/// Back out of log space; overflow saturates instead of reading as zero
fn density_from_log(ln_density: f64) -> f64 {
    if ln_density.is_nan() {
        0.0
    } else {
        ln_density.exp().min(f64::MAX)
    }
}

/// Known traces with at least one successor that is not known
fn frontier(graph: &ProgressionGraph, known: &BTreeSet<Trace>) -> Zpd {
    known
        .iter()
        .filter(|trace| graph.successors(trace).iter().any(|next| !known.contains(next)))
        .cloned()
        .collect()
}
