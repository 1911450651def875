//! Simulated learner over addition knowledge components
//!
//! Eight knowledge components cover one- to four-digit addition with and
//! without carries. Before answering, the problem's component may become
//! learned: with the `high` transition probability if all its prerequisites
//! are learned, `low` otherwise. The answer is correct with probability
//! Π (1 - slip) over learned components and Π guess over the rest, taken
//! across the component and its prerequisites.

use std::collections::BTreeMap;

use clap::ValueEnum;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zpd_algo::sampling::seeded_rng;
use zpd_algo::{Answer, KcState, KnowledgeState, Oracle, OracleError, Problem};

use crate::addition::{ADD, ADD_WITH_CARRY, WRITE_CARRY};

pub const SLIP: f64 = 0.02;
pub const GUESS: f64 = 0.01;

/// Knowledge component -> prerequisite components
pub const PREREQUISITES: [(u32, &[u32]); 8] = [
    (1, &[]),
    (2, &[1]),
    (3, &[1, 2]),
    (4, &[2, 3]),
    (5, &[3]),
    (6, &[4]),
    (7, &[5]),
    (8, &[6]),
];

pub fn prerequisites(kc: u32) -> &'static [u32] {
    PREREQUISITES
        .iter()
        .find(|(k, _)| *k == kc)
        .map(|(_, pre)| *pre)
        .unwrap_or(&[])
}

/// Knowledge component exercised by a trace
///
/// Columns are counted from the addition actions (capped at four digits); any
/// written carry selects the with-carry component for that length.
pub fn kc_for_trace(trace: &str) -> Option<u32> {
    let columns = trace.chars().filter(|c| *c == ADD || *c == ADD_WITH_CARRY).count().min(4) as u32;
    if columns == 0 {
        return None;
    }
    let carries = trace.contains(WRITE_CARRY);
    Some(2 * columns - u32::from(!carries))
}

// ==================== Presets ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum StudentPreset {
    /// Nothing learned
    Novice,
    /// One- and two-digit addition
    Intermediate,
    /// Up to three-digit addition
    Advanced,
    /// Everything learned
    Expert,
}

impl StudentPreset {
    pub fn knowledge_state(self) -> KnowledgeState {
        let learned_up_to = match self {
            StudentPreset::Novice => 0,
            StudentPreset::Intermediate => 4,
            StudentPreset::Advanced => 6,
            StudentPreset::Expert => 8,
        };
        PREREQUISITES
            .iter()
            .map(|(kc, _)| {
                let state = if *kc <= learned_up_to {
                    KcState::Learned
                } else {
                    KcState::NotLearned
                };
                (*kc, state)
            })
            .collect()
    }
}

/// Probabilities of a component becoming learned when exercised
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Some prerequisite is not learned
    pub low: f64,
    /// Every prerequisite is learned
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TransitionPreset {
    /// Never learns during the session
    Static,
    Learning,
}

impl TransitionPreset {
    pub fn transition(self) -> Transition {
        match self {
            TransitionPreset::Static => Transition { low: 0.0, high: 0.0 },
            TransitionPreset::Learning => Transition { low: 0.2, high: 0.6 },
        }
    }
}

// ==================== Student ====================

pub struct SimulatedStudent {
    kc_states: KnowledgeState,
    transition: Transition,
    slip: f64,
    guess: f64,
    rng: ChaCha8Rng,
    answered: usize,
}

impl SimulatedStudent {
    pub fn new(kc_states: KnowledgeState, transition: Transition, seed: Option<u64>) -> Self {
        Self {
            kc_states,
            transition,
            slip: SLIP,
            guess: GUESS,
            rng: seeded_rng(seed),
            answered: 0,
        }
    }

    pub fn from_preset(preset: StudentPreset, transitions: TransitionPreset, seed: Option<u64>) -> Self {
        Self::new(preset.knowledge_state(), transitions.transition(), seed)
    }

    pub fn with_noise(mut self, slip: f64, guess: f64) -> Self {
        self.slip = slip;
        self.guess = guess;
        self
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    fn is_learned(&self, kc: u32) -> bool {
        self.kc_states.get(&kc) == Some(&KcState::Learned)
    }

    fn maybe_learn(&mut self, kc: u32) {
        let ready = prerequisites(kc).iter().all(|pre| self.is_learned(*pre));
        let p = if ready { self.transition.high } else { self.transition.low };
        if !self.is_learned(kc) && self.rng.gen::<f64>() < p {
            self.kc_states.insert(kc, KcState::Learned);
            debug!(kc, "knowledge component learned");
        }
    }

    fn success_probability(&self, kc: u32) -> f64 {
        std::iter::once(&kc)
            .chain(prerequisites(kc))
            .map(|k| if self.is_learned(*k) { 1.0 - self.slip } else { self.guess })
            .product()
    }
}

impl Oracle for SimulatedStudent {
    fn solve(&mut self, problem: &Problem) -> Result<Answer, OracleError> {
        let kc = kc_for_trace(&problem.trace)
            .ok_or_else(|| OracleError(format!("trace {:?} exercises no knowledge component", problem.trace)))?;

        self.maybe_learn(kc);
        self.answered += 1;

        let p = self.success_probability(kc);
        if self.rng.gen::<f64>() < p {
            Ok(Answer::Value(problem.expected_answer))
        } else {
            Ok(Answer::Unsolved)
        }
    }

    fn knowledge_state(&self) -> KnowledgeState {
        self.kc_states.clone()
    }

    fn status(&self) -> String {
        let states: Vec<String> = self
            .kc_states
            .iter()
            .map(|(kc, state)| format!("KC {kc}: {state:?}"))
            .collect();
        format!("{} problems answered; {}", self.answered, states.join(", "))
    }
}
