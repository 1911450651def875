//! Bayesian initial ZPD followed by a ZPDES session.

use serde::Serialize;
use tracing::{info, warn};
use zpd_algo::{BayesianEstimator, Oracle, Trace, Zpd, ZpdesEngine};

use crate::config::SimConfig;
use crate::curriculum::Curriculum;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub trials: usize,
    /// Every active trace graduated before the trial cap
    pub finished: bool,
    pub remaining: Vec<Trace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub init_zpd: Zpd,
    pub session: SessionSummary,
    pub student_status: String,
}

/// Step `engine` until it finishes or `max_trials` problems have been posed
pub fn run_session<O: Oracle + ?Sized>(
    engine: &mut ZpdesEngine<'_>,
    oracle: &mut O,
    max_trials: usize,
) -> Result<SessionSummary> {
    while engine.trials() < max_trials {
        if engine.step(oracle)?.is_none() {
            break;
        }
    }

    let finished = engine.is_finished();
    let remaining: Vec<Trace> = engine.active_traces().cloned().collect();
    if finished {
        info!(trials = engine.trials(), "zpdes session complete");
    } else {
        warn!(trials = engine.trials(), ?remaining, "zpdes session stopped at trial cap");
    }

    Ok(SessionSummary {
        trials: engine.trials(),
        finished,
        remaining,
    })
}

/// Estimate the initial ZPD on `assessed`, then teach `learner` from it
pub fn run_pipeline<A, L>(
    curriculum: &Curriculum,
    config: &SimConfig,
    assessed: &mut A,
    learner: &mut L,
) -> Result<PipelineReport>
where
    A: Oracle + ?Sized,
    L: Oracle + ?Sized,
{
    let report = BayesianEstimator::new(&curriculum.graph, &curriculum.problems, config.bayesian.clone())?
        .estimate(assessed)?;
    info!(init_zpd = ?report.zpd, "initial zpd estimated");

    let mut engine = ZpdesEngine::new(&curriculum.graph, &curriculum.problems, &report.zpd, config.zpdes.clone())?;
    let session = run_session(&mut engine, learner, config.max_zpdes_trials)?;

    let student_status = learner.status();
    info!(status = %student_status, trials = session.trials, "student status");

    Ok(PipelineReport {
        init_zpd: report.zpd,
        session,
        student_status,
    })
}
