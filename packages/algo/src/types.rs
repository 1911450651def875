//! Common Types and Constants
//!
//! Shared data structures used across all estimator modules.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ==================== Constants ====================

/// Synthetic root trace, prerequisite to every basic trace
pub const ROOT_TRACE: &str = "";

/// Default n-gram window used by the complexity comparator
pub const DEFAULT_NGRAM_SIZE: usize = 3;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

// ==================== Core Types ====================

/// Symbolic encoding of the action sequence used to solve a problem family
pub type Trace = String;

/// Output of an estimator: the traces on the mastered/unmastered boundary
pub type Zpd = BTreeSet<Trace>;

/// Ordered, non-empty problem queue per trace
pub type TraceProblems = BTreeMap<Trace, Vec<Problem>>;

/// Learner answer to a posed problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Value(i64),
    /// The learner did not produce a usable answer
    Unsolved,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Value(v) => write!(f, "{}", v),
            Answer::Unsolved => write!(f, "unsolved"),
        }
    }
}

/// A single problem instance of some trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub operand1: i64,
    pub operand2: i64,
    pub expected_answer: i64,
    pub trace: Trace,
}

impl Problem {
    pub fn new(operand1: i64, operand2: i64, expected_answer: i64, trace: impl Into<Trace>) -> Self {
        Self {
            operand1,
            operand2,
            expected_answer,
            trace: trace.into(),
        }
    }

    pub fn is_correct(&self, answer: &Answer) -> bool {
        matches!(answer, Answer::Value(v) if *v == self.expected_answer)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {:?})",
            self.operand1, self.operand2, self.expected_answer, self.trace
        )
    }
}

/// Knowledge component state in the learner model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KcState {
    NotLearned,
    Learned,
}

/// Knowledge component identifier -> state
pub type KnowledgeState = BTreeMap<u32, KcState>;
