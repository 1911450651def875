//! Curriculum: problems grouped by trace plus the progression over those traces.

use std::collections::BTreeSet;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};
use zpd_algo::{form_progression, Comparator, ConfigurationError, Problem, ProgressionGraph, Trace, TraceProblems};

use crate::addition::generate_problems;
use crate::config::SimConfig;

#[derive(Debug, Clone)]
pub struct Curriculum {
    pub graph: ProgressionGraph,
    pub problems: TraceProblems,
}

/// Size summary printed by the driver
#[derive(Debug, Clone, Serialize)]
pub struct CurriculumSummary {
    pub traces: usize,
    pub problems: usize,
    pub basic_traces: BTreeSet<Trace>,
}

impl Curriculum {
    pub fn from_problems<C>(problems: Vec<Problem>, comparator: &C) -> Result<Self, ConfigurationError>
    where
        C: Comparator + ?Sized,
    {
        let mut by_trace = TraceProblems::new();
        for problem in problems {
            by_trace.entry(problem.trace.clone()).or_insert_with(Vec::new).push(problem);
        }

        let traces: BTreeSet<Trace> = by_trace.keys().cloned().collect();
        let graph = form_progression(&traces, comparator)?;

        for (trace, successors) in graph.edges() {
            debug!(trace = %trace, ?successors, "progression edge");
        }
        info!(traces = traces.len(), basic = graph.basic_traces().len(), "created progression");

        Ok(Self {
            graph,
            problems: by_trace,
        })
    }

    /// Random addition curriculum sized by `config`
    pub fn generate<R, C>(config: &SimConfig, comparator: &C, rng: &mut R) -> Result<Self, ConfigurationError>
    where
        R: Rng + ?Sized,
        C: Comparator + ?Sized,
    {
        let problems = generate_problems(&config.digit_counts(), rng);
        Self::from_problems(problems, comparator)
    }

    pub fn summary(&self) -> CurriculumSummary {
        CurriculumSummary {
            traces: self.graph.traces().count(),
            problems: self.problems.values().map(Vec::len).sum(),
            basic_traces: self.graph.basic_traces().clone(),
        }
    }
}
