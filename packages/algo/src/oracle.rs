//! Learner Oracle
//!
//! The single boundary between the estimators and the learner being probed.
//! One call per posed problem; failures are not retried.

use tracing::debug;

use crate::error::{OracleError, Result};
use crate::types::{Answer, KcState, KnowledgeState, Problem};

/// A stochastic, stateful respondent
pub trait Oracle {
    fn solve(&mut self, problem: &Problem) -> std::result::Result<Answer, OracleError>;

    /// Per knowledge component mastery; empty when the oracle has no such model
    fn knowledge_state(&self) -> KnowledgeState;

    /// Diagnostic dump of the learner state
    fn status(&self) -> String;

    /// True when the oracle reports at least one knowledge component and all are learned
    fn has_learned_everything(&self) -> bool {
        let state = self.knowledge_state();
        !state.is_empty() && state.values().all(|s| *s == KcState::Learned)
    }
}

/// Pose `problem` and report whether the answer was correct
pub fn ask<O: Oracle + ?Sized>(oracle: &mut O, problem: &Problem) -> Result<bool> {
    let answer = oracle.solve(problem)?;
    let correct = problem.is_correct(&answer);
    debug!(problem = %problem, answer = %answer, correct, "oracle answered");
    Ok(correct)
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn solve(&mut self, problem: &Problem) -> std::result::Result<Answer, OracleError> {
        (**self).solve(problem)
    }

    fn knowledge_state(&self) -> KnowledgeState {
        (**self).knowledge_state()
    }

    fn status(&self) -> String {
        (**self).status()
    }
}
