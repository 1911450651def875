//! # zpd-algo - Zone of Proximal Development estimation
//!
//! Pure Rust estimators that locate a learner's ZPD over a complexity-ordered
//! graph of solution traces:
//!
//! - **Bayesian** - one-shot prior/posterior update over dependency edges
//! - **Entropy** - information-maximising probes with entropy-threshold colouring
//! - **KL-UCB** - bandit arm selection by KL upper confidence bounds
//! - **ZPDES** - EXP3-style adaptive sampling with progressive expansion
//!
//! ## Modules
//!
//! - [`compare`] - n-gram complexity comparator and topological ordering
//! - [`graph`] - progression/dependency graphs, closures, comparator tables
//! - [`oracle`] - learner contract
//! - [`problems`] - per-trace problem queues
//! - [`numeric`] - special functions, integration, KL bounds
//! - [`sampling`] - seeded Beta and categorical draws
//! - [`sanitize`] - numeric clamping
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use zpd_algo::{zpdes, Oracle, OracleError, Answer, KnowledgeState, Problem,
//!                ProgressionGraph, TraceProblems, Zpd, ZpdesConfig};
//!
//! struct Perfect;
//!
//! impl Oracle for Perfect {
//!     fn solve(&mut self, problem: &Problem) -> Result<Answer, OracleError> {
//!         Ok(Answer::Value(problem.expected_answer))
//!     }
//!     fn knowledge_state(&self) -> KnowledgeState {
//!         KnowledgeState::new()
//!     }
//!     fn status(&self) -> String {
//!         "perfect".to_string()
//!     }
//! }
//!
//! let graph = ProgressionGraph::new([("", vec!["A"]), ("A", vec!["AB"])]).unwrap();
//! let mut problems = TraceProblems::new();
//! problems.insert("A".to_string(), vec![Problem::new(1, 1, 2, "A")]);
//! problems.insert("AB".to_string(), vec![Problem::new(1, 1, 2, "AB")]);
//!
//! let init: Zpd = ["A".to_string()].into_iter().collect();
//! let config = ZpdesConfig { d: 4, h: 0.75, seed: Some(7), ..ZpdesConfig::default() };
//! let trials = zpdes(&graph, &problems, &init, config, &mut Perfect).unwrap();
//! assert_eq!(trials, 6);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod error;
pub mod numeric;
pub mod oracle;
pub mod problems;
pub mod sampling;
pub mod sanitize;
pub mod types;

pub mod compare;
pub mod graph;

pub mod bayesian;
pub mod entropy;
pub mod klucb;
pub mod zpdes;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use error::{ConfigurationError, OracleError, Result, ZpdError};
pub use oracle::{ask, Oracle};

pub use compare::{topological_order, Comparator, NgramComparator};
pub use graph::{form_progression, Closures, ComplexityTables, DependencyGraph, ProgressionGraph};

pub use bayesian::{bayesian_zpd, BayesianConfig, BayesianEstimator, BayesianReport, EdgePosterior};
pub use entropy::{entropy_zpd, Colour, EntropyConfig, EntropyEstimator, EntropyReport};
pub use klucb::{kl_ucb_zpd, KlUcbConfig, KlUcbEstimator, KlUcbReport};
pub use zpdes::{zpdes, StepOutcome, ZpdesConfig, ZpdesEngine};
