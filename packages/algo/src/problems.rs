//! Per-trace problem queues.

use std::collections::BTreeMap;

use crate::error::ConfigurationError;
use crate::graph::ProgressionGraph;
use crate::types::{Problem, Trace, TraceProblems};

/// Every non-root graph trace must own a non-empty queue
pub fn validate_problems(graph: &ProgressionGraph, problems: &TraceProblems) -> Result<(), ConfigurationError> {
    for trace in graph.traces() {
        match problems.get(trace) {
            None => {
                return Err(ConfigurationError::MissingProblems {
                    trace: trace.clone(),
                })
            }
            Some(queue) if queue.is_empty() => {
                return Err(ConfigurationError::EmptyProblems {
                    trace: trace.clone(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Cyclic position into each trace's queue; wraps on exhaustion
#[derive(Debug)]
pub struct ProblemCursor<'a> {
    problems: &'a TraceProblems,
    positions: BTreeMap<Trace, usize>,
}

impl<'a> ProblemCursor<'a> {
    pub fn new(problems: &'a TraceProblems) -> Self {
        Self {
            problems,
            positions: BTreeMap::new(),
        }
    }

    /// Next problem of `trace`, or `None` if it has no queue
    pub fn draw(&mut self, trace: &str) -> Option<&'a Problem> {
        let queue = self.problems.get(trace).filter(|q| !q.is_empty())?;
        let position = self.positions.entry(trace.to_string()).or_insert(0);
        let problem = &queue[*position % queue.len()];
        *position = (*position + 1) % queue.len();
        Some(problem)
    }

    /// Head of the queue, without advancing
    pub fn first(&self, trace: &str) -> Option<&'a Problem> {
        self.problems.get(trace).and_then(|q| q.first())
    }
}
