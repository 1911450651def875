//! KL-UCB Initial ZPD
//!
//! Bandit over traces with Bernoulli pseudo-counts:
//! - Each trace starts from (n0 failures, n1 successes); the root is fixed at p = 1
//! - Round t bounds every trace by u* = max { u : KL(p || u) <= f(t) } with
//!   f(t) = log2(1 + t·log2(log2 t)) / (n0 + n1)
//! - Traces with u* under the lower threshold are candidates; the smallest u*
//!   is probed, ties going to the earlier trace in topological order
//! - Successes count for the trace and everything simpler, failures for the
//!   trace and everything harder; counts are committed at round end
//!
//! A round without candidates is skipped but still consumes the budget.
//!
//! The radius is zero on the first round, so u* = p there; afterwards it grows
//! with t, and a trace stays a candidate only while failures keep its p low.
//! In practice the bandit spends its pulls on traces the learner fails, and a
//! learner who answers correctly is probed about once before every later round
//! is skipped. The default seeds (n0 = 2, n1 = 1) start every trace at p = 1/3
//! so that first pull happens at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compare::{topological_order, Comparator, NgramComparator};
use crate::error::{ConfigurationError, Result};
use crate::graph::{Closures, ProgressionGraph};
use crate::numeric::kl_upper_bound;
use crate::oracle::{ask, Oracle};
use crate::problems::{validate_problems, ProblemCursor};
use crate::sanitize::{clamp_probability, finite_or, is_valid_probability, non_negative};
use crate::types::{Trace, TraceProblems, Zpd, DEFAULT_NGRAM_SIZE, ROOT_TRACE};

/// First round index fed to the radius; log2(log2 t) is undefined below 2
const FIRST_ROUND: usize = 2;

// ==================== Configuration ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlUcbConfig {
    /// Upper confidence below which a trace may be probed
    pub lower_threshold: f64,
    /// Initial failure pseudo-count
    pub n0: f64,
    /// Initial success pseudo-count
    pub n1: f64,
    /// Number of rounds
    pub timeout: usize,
    /// Success probability separating mastered from unmastered traces
    pub p_threshold: f64,
    pub ngram_size: usize,
}

impl Default for KlUcbConfig {
    fn default() -> Self {
        Self {
            lower_threshold: 0.5,
            n0: 2.0,
            n1: 1.0,
            timeout: 1000,
            p_threshold: 0.7,
            ngram_size: DEFAULT_NGRAM_SIZE,
        }
    }
}

impl KlUcbConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if !is_valid_probability(self.lower_threshold) {
            return Err(ConfigurationError::invalid(
                "lower_threshold",
                format!("{} is not a probability", self.lower_threshold),
            ));
        }
        if !is_valid_probability(self.p_threshold) {
            return Err(ConfigurationError::invalid(
                "p_threshold",
                format!("{} is not a probability", self.p_threshold),
            ));
        }
        for (name, count) in [("n0", self.n0), ("n1", self.n1)] {
            if !count.is_finite() || count < 0.0 {
                return Err(ConfigurationError::invalid(name, format!("{count} is not a pseudo-count")));
            }
        }
        if self.n0 + self.n1 <= 0.0 {
            return Err(ConfigurationError::invalid("n1", "n0 + n1 must be positive"));
        }
        if self.timeout == 0 {
            return Err(ConfigurationError::invalid("timeout", "must be at least 1"));
        }
        if self.ngram_size == 0 {
            return Err(ConfigurationError::invalid("ngram_size", "must be at least 1"));
        }
        Ok(())
    }
}

// ==================== Node ====================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Counts {
    failures: f64,
    successes: f64,
}

impl Counts {
    fn total(&self) -> f64 {
        self.failures + self.successes
    }

    fn probability(&self) -> f64 {
        clamp_probability(finite_or(self.successes / self.total(), 0.0))
    }
}

/// Counts read during a round and the buffer written by it
#[derive(Debug, Clone)]
struct KlUcbNode {
    current: Counts,
    next: Counts,
}

impl KlUcbNode {
    fn new(failures: f64, successes: f64) -> Self {
        let counts = Counts { failures, successes };
        Self {
            current: counts,
            next: counts,
        }
    }

    fn commit(&mut self) {
        self.current = self.next;
    }
}

// ==================== Confidence ====================

/// f(t) = log2(1 + t·log2(log2 t)) / samples; 0 where undefined
pub fn confidence_radius(round: usize, samples: f64) -> f64 {
    if round < FIRST_ROUND || samples <= 0.0 {
        return 0.0;
    }
    let t = round as f64;
    let radius = (1.0 + t * t.log2().log2()).log2() / samples;
    non_negative(finite_or(radius, 0.0))
}

/// u* for a Bernoulli estimate `p` backed by `samples` observations at `round`
pub fn upper_confidence(p: f64, samples: f64, round: usize) -> f64 {
    kl_upper_bound(p, confidence_radius(round, samples))
}

// ==================== Report ====================

#[derive(Debug, Clone, Serialize)]
pub struct KlUcbReport {
    pub zpd: Zpd,
    /// Rounds played, skipped ones included
    pub rounds: usize,
    pub skipped_rounds: usize,
    /// Final success probability per trace
    pub probabilities: BTreeMap<Trace, f64>,
}

impl KlUcbReport {
    pub fn problems_asked(&self) -> usize {
        self.rounds - self.skipped_rounds
    }
}

// ==================== Estimator ====================

pub struct KlUcbEstimator<'a, C = NgramComparator> {
    graph: &'a ProgressionGraph,
    problems: &'a TraceProblems,
    config: KlUcbConfig,
    comparator: C,
}

impl<'a> KlUcbEstimator<'a> {
    pub fn new(graph: &'a ProgressionGraph, problems: &'a TraceProblems, config: KlUcbConfig) -> Result<Self> {
        let comparator = NgramComparator::new(config.ngram_size);
        Self::with_comparator(graph, problems, config, comparator)
    }
}

impl<'a, C: Comparator> KlUcbEstimator<'a, C> {
    pub fn with_comparator(
        graph: &'a ProgressionGraph,
        problems: &'a TraceProblems,
        config: KlUcbConfig,
        comparator: C,
    ) -> Result<Self> {
        config.validate()?;
        validate_problems(graph, problems)?;
        Ok(Self {
            graph,
            problems,
            config,
            comparator,
        })
    }

    pub fn estimate<O: Oracle + ?Sized>(&self, oracle: &mut O) -> Result<KlUcbReport> {
        let KlUcbConfig {
            lower_threshold,
            n0,
            n1,
            timeout,
            p_threshold,
            ..
        } = self.config;

        let mut nodes: BTreeMap<Trace, KlUcbNode> =
            self.graph.traces().map(|t| (t.clone(), KlUcbNode::new(n0, n1))).collect();
        nodes.insert(ROOT_TRACE.to_string(), KlUcbNode::new(0.0, 1.0));

        let closures = Closures::compute(self.graph);
        let traces: Vec<Trace> = self.graph.traces().cloned().collect();
        let order = topological_order(&traces, &self.comparator);
        let rank: BTreeMap<&Trace, usize> = order.iter().enumerate().map(|(i, t)| (t, i)).collect();
        debug!(?order, "topological order of traces");

        let cursor = ProblemCursor::new(self.problems);
        let mut rounds = 0usize;
        let mut skipped_rounds = 0usize;

        for round in (FIRST_ROUND..).take(timeout) {
            rounds += 1;

            // Smallest bound under the threshold, earliest in topological order on ties
            let mut arm: Option<(&Trace, f64)> = None;
            for trace in &order {
                let Some(node) = nodes.get(trace) else {
                    continue;
                };
                let bound = upper_confidence(node.current.probability(), node.current.total(), round);
                if bound >= lower_threshold {
                    continue;
                }
                match arm {
                    Some((_, best)) if bound >= best => {}
                    _ => arm = Some((trace, bound)),
                }
            }

            if let Some((trace, bound)) = arm {
                let Some(problem) = cursor.first(trace) else {
                    skipped_rounds += 1;
                    continue;
                };
                let correct = ask(oracle, problem)?;
                info!(round, trace = %trace, bound, problem = %problem, correct, "pulled arm");

                let affected = if correct {
                    closures.less_complex(trace)
                } else {
                    closures.more_complex(trace)
                };
                for name in std::iter::once(trace).chain(affected.iter()) {
                    if let Some(node) = nodes.get_mut(name) {
                        if correct {
                            node.next.successes = node.current.successes + 1.0;
                        } else {
                            node.next.failures = node.current.failures + 1.0;
                        }
                    }
                }

                for node in nodes.values_mut() {
                    node.commit();
                }
                for (name, node) in &nodes {
                    debug!(
                        trace = %name,
                        n0 = node.current.failures,
                        n1 = node.current.successes,
                        p = node.current.probability(),
                        "node state"
                    );
                }
            } else {
                skipped_rounds += 1;
                debug!(round, "no trace under the lower threshold");
            }

            if oracle.has_learned_everything() {
                info!(round, status = %oracle.status(), "learner mastered every knowledge component");
                break;
            }
        }

        let probabilities: BTreeMap<Trace, f64> = nodes
            .iter()
            .filter(|(t, _)| t.as_str() != ROOT_TRACE)
            .map(|(t, n)| (t.clone(), n.current.probability()))
            .collect();
        let zpd = self.threshold_frontier(&nodes, p_threshold);

        info!(?zpd, rounds, skipped_rounds, "generated initial zpd");
        Ok(KlUcbReport {
            zpd,
            rounds,
            skipped_rounds,
            probabilities,
        })
    }

    /// Traces at or under `p_threshold` with a prerequisite above it, plus those prerequisites
    fn threshold_frontier(&self, nodes: &BTreeMap<Trace, KlUcbNode>, p_threshold: f64) -> Zpd {
        let probability = |t: &str| nodes.get(t).map(|n| n.current.probability()).unwrap_or(0.0);
        let dependencies = self.graph.dependency_graph();

        let mut zpd = Zpd::new();
        for (trace, parents) in dependencies.iter() {
            if probability(trace.as_str()) > p_threshold {
                continue;
            }
            let mastered: Vec<&Trace> = parents.iter().filter(|p| probability(p.as_str()) > p_threshold).collect();
            if !mastered.is_empty() {
                zpd.insert(trace.clone());
                zpd.extend(mastered.into_iter().cloned());
            }
        }

        zpd.remove(ROOT_TRACE);
        zpd
    }
}

/// KL-UCB initial ZPD for `oracle`
pub fn kl_ucb_zpd<O: Oracle + ?Sized>(
    graph: &ProgressionGraph,
    problems: &TraceProblems,
    config: KlUcbConfig,
    oracle: &mut O,
) -> Result<Zpd> {
    Ok(KlUcbEstimator::new(graph, problems, config)?.estimate(oracle)?.zpd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZpdError;
    use crate::oracle::testing::{BrokenOracle, ScriptedOracle};
    use crate::types::Problem;

    fn chain() -> (ProgressionGraph, TraceProblems) {
        let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["AB"])]).unwrap();
        let mut problems = TraceProblems::new();
        problems.insert(
            "A".to_string(),
            vec![Problem::new(1, 1, 2, "A"), Problem::new(2, 2, 4, "A")],
        );
        problems.insert("AB".to_string(), vec![Problem::new(5, 5, 10, "AB")]);
        (graph, problems)
    }

    fn config(timeout: usize) -> KlUcbConfig {
        KlUcbConfig {
            timeout,
            ..KlUcbConfig::default()
        }
    }

    fn run(oracle: &mut ScriptedOracle, config: KlUcbConfig) -> KlUcbReport {
        let (graph, problems) = chain();
        KlUcbEstimator::new(&graph, &problems, config)
            .unwrap()
            .estimate(oracle)
            .unwrap()
    }

    #[test]
    fn test_radius_is_zero_on_first_round() {
        assert_eq!(confidence_radius(2, 3.0), 0.0);
        assert_eq!(confidence_radius(1, 3.0), 0.0);
        assert!(confidence_radius(3, 3.0) > 0.0);
        assert!(confidence_radius(10, 3.0) > confidence_radius(10, 6.0));
    }

    #[test]
    fn test_first_round_probes_easiest_trace() {
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        let report = run(&mut oracle, config(1));

        assert_eq!(oracle.calls, 1);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.skipped_rounds, 0);
        // A: (2, 1) -> (2, 2); AB untouched since successes only flow downwards
        assert_eq!(report.probabilities["A"], 0.5);
        assert!((report.probabilities["AB"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_failure_propagates_to_harder_traces() {
        let mut oracle = ScriptedOracle::knowing(&[]);
        let report = run(&mut oracle, config(1));

        assert_eq!(report.probabilities["A"], 0.25);
        assert_eq!(report.probabilities["AB"], 0.25);
    }

    #[test]
    fn test_skipped_rounds_consume_budget() {
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        let report = run(&mut oracle, config(50));

        // After the first pull the growing radius lifts every bound over 0.5
        assert_eq!(report.rounds, 50);
        assert_eq!(report.problems_asked(), oracle.calls);
        assert_eq!(report.skipped_rounds, 50 - oracle.calls);
    }

    #[test]
    fn test_symmetric_seeds_never_pull() {
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        let config = KlUcbConfig {
            n0: 1.0,
            n1: 1.0,
            ..config(10)
        };
        let report = run(&mut oracle, config);

        assert_eq!(oracle.calls, 0);
        assert_eq!(report.skipped_rounds, 10);
        // Only the root is above the threshold, so the basic trace is the frontier
        assert_eq!(report.zpd, Zpd::from(["A".to_string()]));
    }

    #[test]
    fn test_zpd_excludes_root() {
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        let report = run(&mut oracle, config(1));
        assert!(!report.zpd.contains(ROOT_TRACE));
        assert_eq!(report.zpd, Zpd::from(["A".to_string()]));
    }

    #[test]
    fn test_stops_when_everything_learned() {
        let mut oracle = ScriptedOracle::knowing(&["A"]).with_kcs(3);
        oracle.learned = true;
        let report = run(&mut oracle, config(50));
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn test_unbounded_budget_does_not_overflow_rounds() {
        let mut oracle = ScriptedOracle::knowing(&["A"]).with_kcs(3);
        oracle.learned = true;
        let report = run(&mut oracle, config(usize::MAX));
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn test_empty_knowledge_state_runs_full_budget() {
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        oracle.learned = true;
        let report = run(&mut oracle, config(20));
        assert_eq!(report.rounds, 20);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let (graph, problems) = chain();
        let bad = KlUcbConfig {
            lower_threshold: 1.5,
            ..KlUcbConfig::default()
        };
        assert!(matches!(
            KlUcbEstimator::new(&graph, &problems, bad),
            Err(ZpdError::Configuration(ConfigurationError::InvalidParameter {
                name: "lower_threshold",
                ..
            }))
        ));

        let bad = KlUcbConfig {
            n0: 0.0,
            n1: 0.0,
            ..KlUcbConfig::default()
        };
        assert!(KlUcbEstimator::new(&graph, &problems, bad).is_err());
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let (graph, problems) = chain();
        let result = KlUcbEstimator::new(&graph, &problems, config(5))
            .unwrap()
            .estimate(&mut BrokenOracle);
        assert!(matches!(result, Err(ZpdError::Oracle(_))));
    }
}
