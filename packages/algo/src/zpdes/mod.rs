//! ZPDES (Zone of Proximal Development and Empirical Success)
//!
//! EXP3-style sampling over an expanding set of active traces:
//! - P(trace) = (w / Σw)·(1 - γ) + γ / |active|
//! - Each answer is pushed into a window of the last `d` outcomes
//! - reward = newer-half successes / (d/2) + older-half successes / (d/2)
//! - w ← β·w + η·reward
//! - A trace whose window accuracy reaches `h` graduates and unlocks its
//!   progression successors with weight w0
//!
//! The session ends once every active trace has graduated.

use std::collections::{BTreeMap, VecDeque};

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigurationError, Result};
use crate::graph::ProgressionGraph;
use crate::oracle::{ask, Oracle};
use crate::problems::{validate_problems, ProblemCursor};
use crate::sampling::{sample_categorical, seeded_rng};
use crate::sanitize::{finite_or, is_valid_probability, non_negative};
use crate::types::{Trace, TraceProblems, Zpd, ROOT_TRACE};

// ==================== Configuration ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZpdesConfig {
    /// Weight decay
    pub beta: f64,
    /// Reward learning rate
    pub eta: f64,
    /// Window length, even
    pub d: usize,
    /// Mastery threshold on window accuracy
    pub h: f64,
    /// Weight of a newly activated trace
    pub w0: f64,
    /// Exploration floor
    pub gamma: f64,
    pub seed: Option<u64>,
}

impl Default for ZpdesConfig {
    fn default() -> Self {
        Self {
            beta: 0.9,
            eta: 0.4,
            d: 6,
            h: 0.9,
            w0: 1.0,
            gamma: 0.3,
            seed: None,
        }
    }
}

impl ZpdesConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        for (name, value) in [("beta", self.beta), ("eta", self.eta), ("w0", self.w0)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid(name, format!("{value} must be non-negative")));
            }
        }
        if self.d == 0 || self.d % 2 != 0 {
            return Err(ConfigurationError::invalid("d", format!("{} is not a positive even length", self.d)));
        }
        if !is_valid_probability(self.h) {
            return Err(ConfigurationError::invalid("h", format!("{} is not a probability", self.h)));
        }
        if !is_valid_probability(self.gamma) {
            return Err(ConfigurationError::invalid("gamma", format!("{} is not a probability", self.gamma)));
        }
        Ok(())
    }
}

// ==================== Node ====================

#[derive(Debug, Clone)]
struct ZpdesNode {
    weight: f64,
    /// Newest outcome at the front
    window: VecDeque<bool>,
}

impl ZpdesNode {
    fn new(weight: f64, capacity: usize) -> Self {
        Self {
            weight,
            window: VecDeque::with_capacity(capacity),
        }
    }

    fn record(&mut self, correct: bool, capacity: usize) {
        self.window.push_front(correct);
        self.window.truncate(capacity);
    }

    fn reward(&self, capacity: usize) -> f64 {
        let half = capacity / 2;
        let newer = self.window.iter().take(half).filter(|c| **c).count() as f64;
        let older = self.window.iter().skip(half).filter(|c| **c).count() as f64;
        newer / half as f64 + older / half as f64
    }

    fn accuracy(&self, capacity: usize) -> f64 {
        self.window.iter().filter(|c| **c).count() as f64 / capacity as f64
    }
}

// ==================== Engine ====================

/// Result of one trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub trace: Trace,
    pub correct: bool,
    pub reward: f64,
    /// Weight after the update
    pub weight: f64,
    pub accuracy: f64,
    pub graduated: bool,
}

pub struct ZpdesEngine<'a> {
    graph: &'a ProgressionGraph,
    config: ZpdesConfig,
    active: BTreeMap<Trace, ZpdesNode>,
    cursor: ProblemCursor<'a>,
    rng: ChaCha8Rng,
    trials: usize,
}

impl<'a> ZpdesEngine<'a> {
    /// Start a session from `init_zpd`; every initial trace gets weight w0
    pub fn new(
        graph: &'a ProgressionGraph,
        problems: &'a TraceProblems,
        init_zpd: &Zpd,
        config: ZpdesConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_problems(graph, problems)?;
        if let Some(trace) = init_zpd.iter().find(|t| t.as_str() == ROOT_TRACE || !graph.contains(t)) {
            return Err(ConfigurationError::DanglingTrace { trace: trace.clone() }.into());
        }

        let active = init_zpd
            .iter()
            .map(|t| (t.clone(), ZpdesNode::new(config.w0, config.d)))
            .collect();
        info!(traces = init_zpd.len(), "zpdes nodes generated");

        Ok(Self {
            graph,
            rng: seeded_rng(config.seed),
            config,
            active,
            cursor: ProblemCursor::new(problems),
            trials: 0,
        })
    }

    pub fn active_traces(&self) -> impl Iterator<Item = &Trace> {
        self.active.keys()
    }

    pub fn is_finished(&self) -> bool {
        self.active.is_empty()
    }

    pub fn weight(&self, trace: &str) -> Option<f64> {
        self.active.get(trace).map(|n| n.weight)
    }

    /// Problems posed so far
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Selection probability of every active trace
    pub fn selection_probabilities(&self) -> BTreeMap<Trace, f64> {
        let count = self.active.len() as f64;
        let total: f64 = self.active.values().map(|n| n.weight).sum();
        let gamma = self.config.gamma;

        self.active
            .iter()
            .map(|(trace, node)| {
                // All-zero weights leave only the uniform share
                let share = if total > 0.0 { node.weight / total } else { 1.0 / count };
                let p = non_negative(finite_or(share * (1.0 - gamma) + gamma / count, 0.0));
                (trace.clone(), p)
            })
            .collect()
    }

    /// Pose one problem; `None` once the active set is empty
    pub fn step<O: Oracle + ?Sized>(&mut self, oracle: &mut O) -> Result<Option<StepOutcome>> {
        let probabilities = self.selection_probabilities();
        let (traces, weights): (Vec<Trace>, Vec<f64>) = probabilities.into_iter().unzip();
        let Some(index) = sample_categorical(&mut self.rng, &weights) else {
            return Ok(None);
        };
        let trace = traces[index].clone();
        debug!(?traces, ?weights, chosen = %trace, "sampled trace");

        let Some(problem) = self.cursor.draw(&trace) else {
            return Ok(None);
        };
        let correct = ask(oracle, problem)?;
        self.trials += 1;

        let ZpdesConfig { beta, eta, d, h, w0, .. } = self.config;
        let Some(node) = self.active.get_mut(&trace) else {
            return Ok(None);
        };
        node.record(correct, d);
        let reward = node.reward(d);
        node.weight = non_negative(finite_or(beta * node.weight + eta * reward, 0.0));
        let weight = node.weight;
        let accuracy = node.accuracy(d);

        info!(trace = %trace, problem = %problem, correct, reward, weight, accuracy, "zpdes trial");

        let graduated = accuracy >= h;
        if graduated {
            self.active.remove(&trace);
            for next in self.graph.successors(&trace) {
                if !self.active.contains_key(next) {
                    self.active.insert(next.clone(), ZpdesNode::new(w0, d));
                }
            }
            info!(trace = %trace, active = ?self.active.keys().collect::<Vec<_>>(), "trace graduated");
        }

        Ok(Some(StepOutcome {
            trace,
            correct,
            reward,
            weight,
            accuracy,
            graduated,
        }))
    }

    /// Step until every active trace has graduated; returns the trial count
    pub fn run<O: Oracle + ?Sized>(&mut self, oracle: &mut O) -> Result<usize> {
        while self.step(oracle)?.is_some() {}
        info!(trials = self.trials, "zpdes session finished");
        Ok(self.trials)
    }
}

/// Run a full ZPDES session from `init_zpd`; returns the number of problems posed
pub fn zpdes<O: Oracle + ?Sized>(
    graph: &ProgressionGraph,
    problems: &TraceProblems,
    init_zpd: &Zpd,
    config: ZpdesConfig,
    oracle: &mut O,
) -> Result<usize> {
    ZpdesEngine::new(graph, problems, init_zpd, config)?.run(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZpdError;
    use crate::oracle::testing::{BrokenOracle, ScriptedOracle};
    use crate::types::Problem;

    fn setup() -> (ProgressionGraph, TraceProblems) {
        let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["AB"])]).unwrap();
        let mut problems = TraceProblems::new();
        problems.insert("A".to_string(), vec![Problem::new(1, 1, 2, "A")]);
        problems.insert("AB".to_string(), vec![Problem::new(1, 1, 2, "AB")]);
        (graph, problems)
    }

    fn config() -> ZpdesConfig {
        ZpdesConfig {
            d: 4,
            h: 0.75,
            seed: Some(42),
            ..ZpdesConfig::default()
        }
    }

    fn zpd(items: &[&str]) -> Zpd {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_window_keeps_newest_outcomes() {
        let mut node = ZpdesNode::new(1.0, 4);
        for correct in [false, false, true, true, true] {
            node.record(correct, 4);
        }
        assert_eq!(node.window, VecDeque::from([true, true, true, false]));
        assert_eq!(node.accuracy(4), 0.75);
    }

    #[test]
    fn test_reward_splits_window_halves() {
        let mut node = ZpdesNode::new(1.0, 4);
        for correct in [false, false, true, true] {
            node.record(correct, 4);
        }
        // Newer half [true, true] -> 1, older half [false, false] -> 0
        assert_eq!(node.reward(4), 1.0);

        let mut partial = ZpdesNode::new(1.0, 4);
        partial.record(true, 4);
        assert_eq!(partial.reward(4), 0.5);
    }

    #[test]
    fn test_graduation_unlocks_successor() {
        let (graph, problems) = setup();
        let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), config()).unwrap();
        let mut oracle = ScriptedOracle::knowing(&["A", "AB"]);

        let outcomes: Vec<StepOutcome> = (0..3).map(|_| engine.step(&mut oracle).unwrap().unwrap()).collect();
        assert!(outcomes.iter().all(|o| o.trace == "A" && o.correct));
        assert!(!outcomes[1].graduated);
        assert!(outcomes[2].graduated);
        assert_eq!(outcomes[2].accuracy, 0.75);

        assert_eq!(engine.active_traces().cloned().collect::<Zpd>(), zpd(&["AB"]));
        assert_eq!(engine.weight("AB"), Some(1.0));

        assert_eq!(engine.run(&mut oracle).unwrap(), 6);
        assert!(engine.is_finished());
    }

    #[test]
    fn test_weight_update() {
        let (graph, problems) = setup();
        let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), config()).unwrap();
        let outcome = engine
            .step(&mut ScriptedOracle::knowing(&["A"]))
            .unwrap()
            .unwrap();

        // reward 1/2, weight 0.9 * 1 + 0.4 * 0.5
        assert_eq!(outcome.reward, 0.5);
        assert!((outcome.weight - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_no_graduation_below_mastery() {
        let (graph, problems) = setup();
        let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), config()).unwrap();
        let mut oracle = ScriptedOracle::knowing(&[]);

        for _ in 0..20 {
            let outcome = engine.step(&mut oracle).unwrap().unwrap();
            assert!(!outcome.graduated);
            assert_eq!(outcome.weight, engine.weight("A").unwrap());
        }
        assert_eq!(engine.trials(), 20);
        assert_eq!(engine.active_traces().count(), 1);
    }

    #[test]
    fn test_probabilities_form_distribution() {
        let graph = ProgressionGraph::new([("", vec!["A", "B", "C"])]).unwrap();
        let mut problems = TraceProblems::new();
        for trace in ["A", "B", "C"] {
            problems.insert(trace.to_string(), vec![Problem::new(0, 1, 1, trace)]);
        }
        let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A", "B", "C"]), config()).unwrap();
        let mut oracle = ScriptedOracle::knowing(&["B"]);

        for _ in 0..10 {
            let probabilities = engine.selection_probabilities();
            let total: f64 = probabilities.values().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(probabilities.values().all(|p| (0.0..=1.0).contains(p)));
            if engine.step(&mut oracle).unwrap().is_none() {
                break;
            }
        }
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let graph = ProgressionGraph::new([("", vec!["A", "B"])]).unwrap();
        let mut problems = TraceProblems::new();
        for trace in ["A", "B"] {
            problems.insert(trace.to_string(), vec![Problem::new(0, 1, 1, trace)]);
        }
        let config = ZpdesConfig {
            w0: 0.0,
            gamma: 0.0,
            ..config()
        };
        let engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A", "B"]), config).unwrap();
        let probabilities = engine.selection_probabilities();
        assert_eq!(probabilities["A"], 0.5);
        assert_eq!(probabilities["B"], 0.5);
    }

    #[test]
    fn test_empty_init_zpd_finishes_immediately() {
        let (graph, problems) = setup();
        let mut oracle = ScriptedOracle::knowing(&[]);
        assert_eq!(zpdes(&graph, &problems, &Zpd::new(), config(), &mut oracle).unwrap(), 0);
        assert_eq!(oracle.calls, 0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (graph, problems) = setup();
        let odd = ZpdesConfig { d: 3, ..config() };
        assert!(matches!(
            ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), odd),
            Err(ZpdError::Configuration(ConfigurationError::InvalidParameter { name: "d", .. }))
        ));
        assert!(matches!(
            ZpdesEngine::new(&graph, &problems, &zpd(&["Z"]), config()),
            Err(ZpdError::Configuration(ConfigurationError::DanglingTrace { .. }))
        ));
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let (graph, problems) = setup();
        let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), config()).unwrap();
        assert!(matches!(engine.step(&mut BrokenOracle), Err(ZpdError::Oracle(_))));
        assert_eq!(engine.trials(), 0);
    }
}
