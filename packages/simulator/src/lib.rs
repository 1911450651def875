//! # zpd-sim - simulated learners for the ZPD estimators
//!
//! - [`addition`] - column-addition problems and their traces
//! - [`curriculum`] - problems grouped by trace with their progression graph
//! - [`student`] - knowledge-component learner implementing [`zpd_algo::Oracle`]
//! - [`pipeline`] - Bayesian initial ZPD feeding a ZPDES session
//! - [`config`] / [`logging`] - environment, file and subscriber setup

pub mod addition;
pub mod config;
pub mod curriculum;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod student;

pub use config::{LogSettings, SimConfig};
pub use curriculum::Curriculum;
pub use error::{Result, SimError};
pub use pipeline::{run_pipeline, run_session, PipelineReport, SessionSummary};
pub use student::{SimulatedStudent, StudentPreset, TransitionPreset};
