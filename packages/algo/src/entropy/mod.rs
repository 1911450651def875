//! Entropy Initial ZPD
//!
//! Information-maximising probe selection with entropy-threshold colouring.
//! Every trace keeps cancelling correct/incorrect counters; its weight is the
//! binary entropy of (c + c0) / (ic + 2·c0). Each round probes the uncoloured
//! trace that best splits the remaining uncertainty, propagates the answer
//! along the progression closures, and colours traces whose weight drops
//! under the threshold.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compare::{Comparator, NgramComparator};
use crate::error::{ConfigurationError, Result};
use crate::graph::{Closures, ComplexityTables, ProgressionGraph};
use crate::numeric::binary_entropy;
use crate::oracle::{ask, Oracle};
use crate::problems::{validate_problems, ProblemCursor};
use crate::types::{Trace, TraceProblems, Zpd, DEFAULT_NGRAM_SIZE};

// ==================== Configuration ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Pseudo-count c0 added to both outcomes
    pub regularisation: f64,
    /// Weight below which a trace gets coloured
    pub entropy_threshold: f64,
    pub ngram_size: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            regularisation: 4.0,
            entropy_threshold: 0.35,
            ngram_size: DEFAULT_NGRAM_SIZE,
        }
    }
}

impl EntropyConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if !(self.regularisation.is_finite() && self.regularisation > 0.0) {
            return Err(ConfigurationError::invalid(
                "regularisation",
                format!("{} is not a positive pseudo-count", self.regularisation),
            ));
        }
        // Weights never go negative, so a threshold at or below 0 colours nothing
        if !(self.entropy_threshold.is_finite() && self.entropy_threshold > 0.0) {
            return Err(ConfigurationError::invalid(
                "entropy_threshold",
                format!("{} must be positive", self.entropy_threshold),
            ));
        }
        if self.ngram_size == 0 {
            return Err(ConfigurationError::invalid("ngram_size", "must be at least 1"));
        }
        Ok(())
    }
}

// ==================== Node ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colour {
    Uncoloured,
    Solvable,
    Unsolvable,
}

#[derive(Debug, Clone)]
struct EntropyNode {
    correct: u32,
    incorrect: u32,
    weight: f64,
    colour: Colour,
}

impl EntropyNode {
    fn new(c0: f64) -> Self {
        let mut node = Self {
            correct: 0,
            incorrect: 0,
            weight: 0.0,
            colour: Colour::Uncoloured,
        };
        node.update_weight(c0);
        node
    }

    /// Opposite outcomes cancel before a new one is counted
    fn record(&mut self, correct: bool) {
        if correct {
            if self.incorrect > 0 {
                self.incorrect -= 1;
            } else {
                self.correct += 1;
            }
        } else if self.correct > 0 {
            self.correct -= 1;
        } else {
            self.incorrect += 1;
        }
    }

    fn update_weight(&mut self, c0: f64) {
        let arg = (self.correct as f64 + c0) / (self.incorrect as f64 + 2.0 * c0);
        self.weight = binary_entropy(arg);
    }
}

// ==================== Report ====================

#[derive(Debug, Clone, Serialize)]
pub struct EntropyReport {
    pub zpd: Zpd,
    pub problems_asked: usize,
    pub colours: BTreeMap<Trace, Colour>,
}

// ==================== Estimator ====================

pub struct EntropyEstimator<'a, C = NgramComparator> {
    graph: &'a ProgressionGraph,
    problems: &'a TraceProblems,
    config: EntropyConfig,
    comparator: C,
}

impl<'a> EntropyEstimator<'a> {
    pub fn new(graph: &'a ProgressionGraph, problems: &'a TraceProblems, config: EntropyConfig) -> Result<Self> {
        let comparator = NgramComparator::new(config.ngram_size);
        Self::with_comparator(graph, problems, config, comparator)
    }
}

impl<'a, C: Comparator> EntropyEstimator<'a, C> {
    pub fn with_comparator(
        graph: &'a ProgressionGraph,
        problems: &'a TraceProblems,
        config: EntropyConfig,
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

    pub fn estimate<O: Oracle + ?Sized>(&self, oracle: &mut O) -> Result<EntropyReport> {
        let c0 = self.config.regularisation;
        let threshold = self.config.entropy_threshold;

        let mut nodes: BTreeMap<Trace, EntropyNode> =
            self.graph.traces().map(|t| (t.clone(), EntropyNode::new(c0))).collect();
        let tables = ComplexityTables::compute(self.graph.traces(), &self.comparator);
        let closures = Closures::compute(self.graph);

        let mut uncoloured: BTreeSet<Trace> = nodes.keys().cloned().collect();
        let mut cursor = ProblemCursor::new(self.problems);
        let mut problems_asked = 0usize;

        info!(traces = uncoloured.len(), c0, threshold, "starting entropy loop");

        while let Some(chosen) = self.most_informative(&uncoloured, &tables, &nodes) {
            let Some(problem) = cursor.draw(&chosen) else {
                break;
            };
            let correct = ask(oracle, problem)?;
            problems_asked += 1;
            info!(trace = %chosen, problem = %problem, correct, "probed trace");

            let propagated = if correct {
                closures.less_complex(&chosen)
            } else {
                closures.more_complex(&chosen)
            };
            let touched = std::iter::once(&chosen)
                .chain(propagated.iter().filter(|t| uncoloured.contains(*t)));
            for trace in touched {
                if let Some(node) = nodes.get_mut(trace) {
                    node.record(correct);
                    node.update_weight(c0);
                }
            }

            let mut newly_coloured = Vec::new();
            for trace in &uncoloured {
                let Some(node) = nodes.get_mut(trace) else {
                    continue;
                };
                if node.weight < threshold {
                    node.colour = if node.correct > 0 {
                        Colour::Solvable
                    } else {
                        Colour::Unsolvable
                    };
                    debug!(trace = %trace, colour = ?node.colour, weight = node.weight, "coloured trace");
                    newly_coloured.push(trace.clone());
                }
            }
            for trace in newly_coloured {
                uncoloured.remove(&trace);
            }

            for (trace, node) in &nodes {
                debug!(
                    trace = %trace,
                    c = node.correct,
                    ic = node.incorrect,
                    weight = node.weight,
                    colour = ?node.colour,
                    "node state"
                );
            }
        }

        let colours: BTreeMap<Trace, Colour> = nodes.iter().map(|(t, n)| (t.clone(), n.colour)).collect();
        let zpd = coloured_frontier(self.graph, &colours);

        info!(?zpd, problems_asked, "generated initial zpd");
        Ok(EntropyReport {
            zpd,
            problems_asked,
            colours,
        })
    }

    /// Uncoloured trace maximising min(Σ at-most weights, Σ at-least weights)
    ///
    /// Sums only run over uncoloured traces; the first maximum in trace order wins.
    fn most_informative(
        &self,
        uncoloured: &BTreeSet<Trace>,
        tables: &ComplexityTables,
        nodes: &BTreeMap<Trace, EntropyNode>,
    ) -> Option<Trace> {
        let total = |set: &BTreeSet<Trace>| -> f64 {
            set.iter()
                .filter(|t| uncoloured.contains(*t))
                .filter_map(|t| nodes.get(t))
                .map(|n| n.weight)
                .sum()
        };

        let mut best: Option<(&Trace, f64)> = None;
        for trace in uncoloured {
            let score = total(tables.at_most(trace)).min(total(tables.at_least(trace)));
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((trace, score)),
            }
        }

        best.map(|(trace, _)| trace.clone())
    }
}

/// Entropy initial ZPD for `oracle`
pub fn entropy_zpd<O: Oracle + ?Sized>(
    graph: &ProgressionGraph,
    problems: &TraceProblems,
    config: EntropyConfig,
    oracle: &mut O,
) -> Result<Zpd> {
    Ok(EntropyEstimator::new(graph, problems, config)?.estimate(oracle)?.zpd)
}

/// Solvable traces with a non-solvable successor, plus those successors
fn coloured_frontier(graph: &ProgressionGraph, colours: &BTreeMap<Trace, Colour>) -> Zpd {
    let solvable = |t: &Trace| colours.get(t) == Some(&Colour::Solvable);

    let mut zpd = Zpd::new();
    for trace in colours.keys().filter(|&t| solvable(t)) {
        let unsolved: Vec<&Trace> = graph.successors(trace).iter().filter(|&t| !solvable(t)).collect();
        if !unsolved.is_empty() {
            zpd.insert(trace.clone());
            zpd.extend(unsolved.into_iter().cloned());
        }
    }

    if !colours.values().any(|c| *c == Colour::Solvable) {
        zpd = graph.basic_traces().clone();
    }
    zpd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZpdError;
    use crate::oracle::testing::{BrokenOracle, ScriptedOracle};
    use crate::types::Problem;

    fn chain() -> (ProgressionGraph, TraceProblems) {
        let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["B"])]).unwrap();
        let mut problems = TraceProblems::new();
        problems.insert("A".to_string(), vec![Problem::new(1, 1, 2, "A")]);
        problems.insert("B".to_string(), vec![Problem::new(5, 5, 10, "B")]);
        (graph, problems)
    }

    fn traces(items: &[&str]) -> Zpd {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counters_cancel() {
        let mut node = EntropyNode::new(4.0);
        assert!((node.weight - 1.0).abs() < 1e-12);

        node.record(false);
        node.record(true);
        assert_eq!((node.correct, node.incorrect), (0, 0));

        node.record(true);
        node.record(true);
        node.record(false);
        assert_eq!((node.correct, node.incorrect), (1, 0));
    }

    #[test]
    fn test_weight_reaches_zero_at_regularisation() {
        let mut node = EntropyNode::new(4.0);
        for _ in 0..4 {
            node.record(true);
            node.update_weight(4.0);
        }
        // (4 + 4) / (0 + 8) = 1 lies outside the open interval
        assert_eq!(node.weight, 0.0);
    }

    #[test]
    fn test_colours_known_and_unknown_traces() {
        let (graph, problems) = chain();
        let mut oracle = ScriptedOracle::knowing(&["A"]);
        let report = EntropyEstimator::new(&graph, &problems, EntropyConfig::default())
            .unwrap()
            .estimate(&mut oracle)
            .unwrap();

        assert_eq!(report.colours["A"], Colour::Solvable);
        assert_eq!(report.colours["B"], Colour::Unsolvable);
        // Four successes empty A's entropy; B needs 53 failures to drop under 0.35
        assert_eq!(report.problems_asked, 57);
        assert_eq!(oracle.calls, report.problems_asked);
        assert_eq!(report.zpd, traces(&["A", "B"]));
    }

    #[test]
    fn test_failure_propagates_to_harder_traces() {
        let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["AB"]), ("AB", vec!["ABC"])]).unwrap();
        let mut problems = TraceProblems::new();
        for trace in ["A", "AB", "ABC"] {
            problems.insert(trace.to_string(), vec![Problem::new(0, 0, 7, trace)]);
        }

        let report = EntropyEstimator::new(&graph, &problems, EntropyConfig::default())
            .unwrap()
            .estimate(&mut ScriptedOracle::knowing(&[]))
            .unwrap();

        assert!(report.colours.values().all(|c| *c == Colour::Unsolvable));
        // Nothing solvable: fall back to the basic traces
        assert_eq!(report.zpd, traces(&["A"]));
        // Harder traces were coloured by propagation, so fewer than 3 x 53 probes
        assert!(report.problems_asked < 3 * 53);
    }

    #[test]
    fn test_success_propagates_to_easier_traces() {
        let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["AB"]), ("AB", vec!["ABC"])]).unwrap();
        let mut problems = TraceProblems::new();
        for trace in ["A", "AB", "ABC"] {
            problems.insert(trace.to_string(), vec![Problem::new(0, 0, 7, trace)]);
        }

        let report = EntropyEstimator::new(&graph, &problems, EntropyConfig::default())
            .unwrap()
            .estimate(&mut ScriptedOracle::knowing(&["A", "AB", "ABC"]))
            .unwrap();

        assert!(report.colours.values().all(|c| *c == Colour::Solvable));
        // Leaves have no successors, so the frontier is empty
        assert!(report.zpd.is_empty());
        assert!(report.problems_asked <= 3 * 4);
    }

    #[test]
    fn test_coloured_frontier() {
        let graph = ProgressionGraph::new([("", vec!["A", "B"]), ("A", vec!["AB"]), ("B", vec!["AB"])]).unwrap();
        let colours: BTreeMap<Trace, Colour> = [
            ("A".to_string(), Colour::Solvable),
            ("B".to_string(), Colour::Solvable),
            ("AB".to_string(), Colour::Unsolvable),
        ]
        .into_iter()
        .collect();

        assert_eq!(coloured_frontier(&graph, &colours), traces(&["A", "AB", "B"]));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let (graph, problems) = chain();
        let config = EntropyConfig {
            entropy_threshold: 0.0,
            ..EntropyConfig::default()
        };
        assert!(matches!(
            EntropyEstimator::new(&graph, &problems, config),
            Err(ZpdError::Configuration(ConfigurationError::InvalidParameter {
                name: "entropy_threshold",
                ..
            }))
        ));
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let (graph, problems) = chain();
        let result = EntropyEstimator::new(&graph, &problems, EntropyConfig::default())
            .unwrap()
            .estimate(&mut BrokenOracle);
        assert!(matches!(result, Err(ZpdError::Oracle(_))));
    }
}
