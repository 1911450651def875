//! Trace Complexity Comparison
//!
//! Relative complexity of two traces is approximated by their n-gram sets:
//! a trace is at least as complex as another when its n-grams cover the
//! other's. The relation is a partial order. `compare` returns 0 both for
//! ties and for incomparable pairs, so 0 must never be read as equality.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Trace, DEFAULT_NGRAM_SIZE};

/// Pairwise complexity relation between traces
pub trait Comparator {
    /// True when `t1` is at least as complex as `t2`
    fn atleast_complex(&self, t1: &str, t2: &str) -> bool;

    /// +1 if only `t1 >= t2`, -1 if only `t2 >= t1`, 0 otherwise
    fn compare(&self, t1: &str, t2: &str) -> i8 {
        let forward = self.atleast_complex(t1, t2);
        let backward = self.atleast_complex(t2, t1);
        match (forward, backward) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        }
    }
}

/// N-gram set comparator with a fixed window size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramComparator {
    ngram_size: usize,
}

impl NgramComparator {
    pub fn new(ngram_size: usize) -> Self {
        Self {
            ngram_size: ngram_size.max(1),
        }
    }

    pub fn ngram_size(&self) -> usize {
        self.ngram_size
    }

    /// Contiguous windows of `ngram_size` symbols; a shorter trace is its own single n-gram
    pub fn ngrams<'a>(&self, trace: &'a str) -> BTreeSet<&'a str> {
        let bounds: Vec<usize> = trace
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(trace.len()))
            .collect();
        let symbols = bounds.len() - 1;

        if symbols < self.ngram_size {
            return BTreeSet::from([trace]);
        }

        (0..=symbols - self.ngram_size)
            .map(|i| &trace[bounds[i]..bounds[i + self.ngram_size]])
            .collect()
    }

    fn is_short(&self, trace: &str) -> bool {
        trace.chars().count() < self.ngram_size
    }
}

impl Default for NgramComparator {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAM_SIZE)
    }
}

impl Comparator for NgramComparator {
    fn atleast_complex(&self, t1: &str, t2: &str) -> bool {
        let t1_ngrams = self.ngrams(t1);
        let t2_ngrams = self.ngrams(t2);

        // Equal sets are included in the superset test
        if t1_ngrams.is_superset(&t2_ngrams) {
            return true;
        }

        self.is_short(t1) && self.is_short(t2) && t1.contains(t2) && !t2.contains(t1)
    }
}

/// Stable topological order of `traces` under the strict complexity relation
///
/// Kahn's algorithm over pairs with `compare(b, a) > 0`; among traces whose
/// simpler traces are all placed, the lexicographically smallest comes first.
/// Pairs that compare to 0 impose no constraint.
pub fn topological_order<C: Comparator + ?Sized>(traces: &[Trace], comparator: &C) -> Vec<Trace> {
    let unique: BTreeSet<&Trace> = traces.iter().collect();
    let nodes: Vec<&Trace> = unique.into_iter().collect();

    let mut in_degree: BTreeMap<&Trace, usize> = nodes.iter().map(|t| (*t, 0)).collect();
    let mut more_complex: BTreeMap<&Trace, Vec<&Trace>> = BTreeMap::new();

    for &a in &nodes {
        for &b in &nodes {
            if comparator.compare(b, a) > 0 {
                more_complex.entry(a).or_default().push(b);
                *in_degree.entry(b).or_default() += 1;
            }
        }
    }

    let mut ready: BTreeSet<&Trace> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(t, _)| *t)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(trace) = ready.pop_first() {
        order.push(trace.clone());
        for &next in more_complex.get(trace).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(d) = in_degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    // Only reachable if the relation is cyclic; keep the leftovers in name order
    if order.len() < nodes.len() {
        let placed: BTreeSet<Trace> = order.iter().cloned().collect();
        order.extend(nodes.iter().filter(|t| !placed.contains(**t)).map(|t| (*t).clone()));
    }

    order
}
