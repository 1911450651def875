#![allow(dead_code)]

use std::collections::BTreeSet;

use zpd_algo::{Answer, KnowledgeState, Oracle, OracleError, Problem, ProgressionGraph, TraceProblems};

/// Answers every problem of a known trace correctly and nothing else
pub struct KnownTraces {
    known: BTreeSet<String>,
    pub asked: Vec<String>,
}

impl KnownTraces {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: known.iter().map(|s| s.to_string()).collect(),
            asked: Vec::new(),
        }
    }
}

impl Oracle for KnownTraces {
    fn solve(&mut self, problem: &Problem) -> Result<Answer, OracleError> {
        self.asked.push(problem.trace.clone());
        if self.known.contains(&problem.trace) {
            Ok(Answer::Value(problem.expected_answer))
        } else {
            Ok(Answer::Unsolved)
        }
    }

    fn knowledge_state(&self) -> KnowledgeState {
        KnowledgeState::new()
    }

    fn status(&self) -> String {
        format!("known traces {:?}, {} problems asked", self.known, self.asked.len())
    }
}

pub fn graph(edges: &[(&str, &[&str])]) -> ProgressionGraph {
    ProgressionGraph::new(edges.iter().map(|(t, next)| (*t, next.to_vec()))).unwrap()
}

/// One single-problem queue per non-root trace of `graph`
pub fn single_problems(graph: &ProgressionGraph) -> TraceProblems {
    graph
        .traces()
        .map(|t| (t.clone(), vec![Problem::new(1, 1, 2, t.as_str())]))
        .collect()
}
