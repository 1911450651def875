//! Progression and Dependency Graphs
//!
//! The progression graph maps each trace to its immediately more complex
//! traces and is rooted at the synthetic empty trace. The dependency graph is
//! its exact reverse. Transitive closures and comparator tables are computed
//! once per estimator run and reused by the trial loop.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::compare::Comparator;
use crate::error::ConfigurationError;
use crate::types::{Trace, ROOT_TRACE};

static NO_TRACES: BTreeSet<Trace> = BTreeSet::new();

// ==================== Progression Graph ====================

/// Acyclic trace -> more-complex-traces mapping, reachable from the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionGraph {
    edges: BTreeMap<Trace, BTreeSet<Trace>>,
}

impl ProgressionGraph {
    /// Build and validate a progression graph
    ///
    /// Traces that only appear as successors become leaves. Without an
    /// explicit root, one is added above every parentless trace.
    pub fn new<I, K, V, T>(edges: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Trace>,
        V: IntoIterator<Item = T>,
        T: Into<Trace>,
    {
        let mut map: BTreeMap<Trace, BTreeSet<Trace>> = BTreeMap::new();
        for (trace, successors) in edges {
            let successors: BTreeSet<Trace> = successors.into_iter().map(Into::into).collect();
            map.entry(trace.into()).or_default().extend(successors);
        }

        let referenced: Vec<Trace> = map.values().flatten().cloned().collect();
        for trace in referenced {
            map.entry(trace).or_default();
        }

        if !map.contains_key(ROOT_TRACE) {
            let children: BTreeSet<&Trace> = map.values().flatten().collect();
            let basic: BTreeSet<Trace> = map
                .keys()
                .filter(|t| !children.contains(t))
                .cloned()
                .collect();
            map.insert(ROOT_TRACE.to_string(), basic);
        }

        let graph = Self { edges: map };
        graph.check_acyclic()?;
        graph.check_reachable()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), ConfigurationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: BTreeMap<&Trace, Mark> = BTreeMap::new();
        for start in self.edges.keys() {
            if marks.contains_key(start) {
                continue;
            }

            // Iterative DFS: (trace, index of next successor to visit)
            let mut stack: Vec<(&Trace, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::Open);

            while let Some((trace, next)) = stack.pop() {
                let successors = self.successors(trace);
                if let Some(child) = successors.iter().nth(next) {
                    stack.push((trace, next + 1));
                    match marks.get(child) {
                        Some(Mark::Open) => {
                            return Err(ConfigurationError::Cycle {
                                trace: child.clone(),
                            })
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::Open);
                            stack.push((child, 0));
                        }
                    }
                } else {
                    marks.insert(trace, Mark::Done);
                }
            }
        }

        Ok(())
    }

    fn check_reachable(&self) -> Result<(), ConfigurationError> {
        let mut seen: BTreeSet<&Trace> = BTreeSet::new();
        let mut pending: Vec<&Trace> = self.edges.keys().filter(|t| t.is_empty()).collect();

        while let Some(trace) = pending.pop() {
            if seen.insert(trace) {
                pending.extend(self.successors(trace));
            }
        }

        match self.edges.keys().find(|t| !seen.contains(t)) {
            Some(trace) => Err(ConfigurationError::DanglingTrace {
                trace: trace.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Immediately more complex traces
    pub fn successors(&self, trace: &str) -> &BTreeSet<Trace> {
        self.edges.get(trace).unwrap_or(&NO_TRACES)
    }

    /// Traces with no prerequisite besides the root
    pub fn basic_traces(&self) -> &BTreeSet<Trace> {
        self.successors(ROOT_TRACE)
    }

    /// All traces except the synthetic root
    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.edges.keys().filter(|t| t.as_str() != ROOT_TRACE)
    }

    pub fn contains(&self, trace: &str) -> bool {
        self.edges.contains_key(trace)
    }

    /// Number of traces, root included
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &BTreeMap<Trace, BTreeSet<Trace>> {
        &self.edges
    }

    /// Exact reverse of this graph
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut parents: BTreeMap<Trace, BTreeSet<Trace>> =
            self.edges.keys().map(|t| (t.clone(), BTreeSet::new())).collect();

        for (trace, successors) in &self.edges {
            for child in successors {
                parents.entry(child.clone()).or_default().insert(trace.clone());
            }
        }

        DependencyGraph { parents }
    }
}

// ==================== Dependency Graph ====================

/// Trace -> immediately less complex traces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    parents: BTreeMap<Trace, BTreeSet<Trace>>,
}

impl DependencyGraph {
    pub fn parents(&self, trace: &str) -> &BTreeSet<Trace> {
        self.parents.get(trace).unwrap_or(&NO_TRACES)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Trace, &BTreeSet<Trace>)> {
        self.parents.iter()
    }
}

// ==================== Closures ====================

/// Transitive strictly-more / strictly-less complex sets over progression edges
#[derive(Debug, Clone, Default)]
pub struct Closures {
    more_complex: BTreeMap<Trace, BTreeSet<Trace>>,
    less_complex: BTreeMap<Trace, BTreeSet<Trace>>,
}

impl Closures {
    /// Forward closure from every non-root trace
    pub fn compute(graph: &ProgressionGraph) -> Self {
        let mut closures = Self::default();
        for trace in graph.traces() {
            closures.less_complex.entry(trace.clone()).or_default();
        }

        for trace in graph.traces() {
            let mut reached: BTreeSet<Trace> = BTreeSet::new();
            let mut pending: Vec<&Trace> = graph.successors(trace).iter().collect();

            while let Some(next) = pending.pop() {
                if reached.insert(next.clone()) {
                    pending.extend(graph.successors(next));
                    closures
                        .less_complex
                        .entry(next.clone())
                        .or_default()
                        .insert(trace.clone());
                }
            }

            closures.more_complex.insert(trace.clone(), reached);
        }

        debug!(traces = closures.more_complex.len(), "computed progression closures");
        closures
    }

    pub fn more_complex(&self, trace: &str) -> &BTreeSet<Trace> {
        self.more_complex.get(trace).unwrap_or(&NO_TRACES)
    }

    pub fn less_complex(&self, trace: &str) -> &BTreeSet<Trace> {
        self.less_complex.get(trace).unwrap_or(&NO_TRACES)
    }
}

/// Comparator-derived at-least / at-most complex sets, each trace excluded from its own sets
#[derive(Debug, Clone, Default)]
pub struct ComplexityTables {
    at_least: BTreeMap<Trace, BTreeSet<Trace>>,
    at_most: BTreeMap<Trace, BTreeSet<Trace>>,
}

impl ComplexityTables {
    pub fn compute<'a, I, C>(traces: I, comparator: &C) -> Self
    where
        I: IntoIterator<Item = &'a Trace>,
        C: Comparator + ?Sized,
    {
        let traces: Vec<&Trace> = traces.into_iter().collect();
        let mut tables = Self::default();

        for &t1 in &traces {
            let mut at_least = BTreeSet::new();
            let mut at_most = BTreeSet::new();
            for &t2 in &traces {
                if t1 == t2 {
                    continue;
                }
                if comparator.atleast_complex(t2, t1) {
                    at_least.insert(t2.clone());
                }
                if comparator.atleast_complex(t1, t2) {
                    at_most.insert(t2.clone());
                }
            }
            tables.at_least.insert(t1.clone(), at_least);
            tables.at_most.insert(t1.clone(), at_most);
        }

        tables
    }

    pub fn at_least(&self, trace: &str) -> &BTreeSet<Trace> {
        self.at_least.get(trace).unwrap_or(&NO_TRACES)
    }

    pub fn at_most(&self, trace: &str) -> &BTreeSet<Trace> {
        self.at_most.get(trace).unwrap_or(&NO_TRACES)
    }
}

// ==================== Progression Construction ====================

/// Progression graph of covering edges under `comparator`
///
/// An edge t -> t2 exists when t2 is strictly more complex than t and no
/// other strictly-more-complex t3 of t sits strictly below t2.
pub fn form_progression<C>(traces: &BTreeSet<Trace>, comparator: &C) -> Result<ProgressionGraph, ConfigurationError>
where
    C: Comparator + ?Sized,
{
    let traces: Vec<&Trace> = traces.iter().filter(|t| t.as_str() != ROOT_TRACE).collect();
    let mut edges: BTreeMap<Trace, Vec<Trace>> = BTreeMap::new();

    for &trace in &traces {
        let more_complex: Vec<&Trace> = traces
            .iter()
            .copied()
            .filter(|t| comparator.compare(t, trace) > 0)
            .collect();

        let covering: Vec<Trace> = more_complex
            .iter()
            .filter(|t| !more_complex.iter().any(|x| comparator.compare(t, x) > 0))
            .map(|t| (*t).clone())
            .collect();

        edges.insert(trace.clone(), covering);
    }

    ProgressionGraph::new(edges)
}
