//! zpd-sim - run the ZPD estimators against simulated addition learners.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use zpd_algo::sampling::seeded_rng;
use zpd_algo::{BayesianEstimator, EntropyEstimator, KlUcbEstimator, NgramComparator, Oracle, Zpd, ZpdesEngine};
use zpd_sim::logging::init_tracing;
use zpd_sim::{run_pipeline, run_session, Curriculum, LogSettings, SimConfig, SimulatedStudent, StudentPreset, TransitionPreset};

#[derive(Parser)]
#[command(name = "zpd-sim")]
#[command(about = "Estimate the zone of proximal development of simulated addition learners", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file overriding environment settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for problems, learners and estimators
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Problems generated per operand length
    #[arg(long, global = true)]
    problems_per_digit: Option<usize>,

    /// Longest operand length
    #[arg(long, global = true)]
    max_digits: Option<u32>,

    /// Initial knowledge of the learner
    #[arg(long, global = true, value_enum, default_value = "intermediate")]
    student: StudentPreset,

    /// Learning behaviour of the learner
    #[arg(long, global = true, value_enum, default_value = "static")]
    transitions: TransitionPreset,
}

#[derive(Subcommand)]
enum Commands {
    /// Bayesian initial ZPD
    Bayesian {
        /// Problems asked per trace
        #[arg(long)]
        timeout: Option<usize>,
        /// Posterior threshold for a known trace
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Entropy-colouring initial ZPD
    Entropy {
        #[arg(long)]
        entropy_threshold: Option<f64>,
        #[arg(long)]
        regularisation: Option<f64>,
    },
    /// KL-UCB initial ZPD
    KlUcb {
        /// Number of rounds
        #[arg(long)]
        timeout: Option<usize>,
        #[arg(long)]
        lower_threshold: Option<f64>,
        #[arg(long)]
        p_threshold: Option<f64>,
    },
    /// ZPDES session from the given traces (basic traces when empty)
    Zpdes {
        #[arg(long, value_delimiter = ',')]
        init: Vec<String>,
        /// Window length
        #[arg(long)]
        d: Option<usize>,
        /// Mastery threshold
        #[arg(long)]
        h: Option<f64>,
        /// Stop after this many problems
        #[arg(long)]
        max_trials: Option<usize>,
    },
    /// Bayesian initial ZPD on one learner, then ZPDES on a second one
    Pipeline {
        /// Learning behaviour of the ZPDES learner
        #[arg(long, value_enum, default_value = "learning")]
        zpdes_transitions: TransitionPreset,
        #[arg(long)]
        max_trials: Option<usize>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _log_guard = init_tracing(&LogSettings::from_env());

    let mut config = SimConfig::load(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(v) = cli.problems_per_digit {
        config.problems_per_digit = v;
    }
    if let Some(v) = cli.max_digits {
        config.max_digits = v;
    }
    apply_overrides(&mut config, &cli.command);
    let config = config.resolved();
    config.validate().context("invalid configuration")?;

    let comparator = NgramComparator::new(config.ngram_size);
    let mut rng = seeded_rng(config.seed);
    let curriculum = Curriculum::generate(&config, &comparator, &mut rng).context("failed to build curriculum")?;
    print_json(&curriculum.summary())?;

    let student_seed = config.seed.map(|s| s.wrapping_add(3));
    let mut student = SimulatedStudent::from_preset(cli.student, cli.transitions, student_seed);

    match cli.command {
        Commands::Bayesian { .. } => {
            let report = BayesianEstimator::new(&curriculum.graph, &curriculum.problems, config.bayesian.clone())?
                .estimate(&mut student)?;
            print_json(&report)?;
        }
        Commands::Entropy { .. } => {
            let report = EntropyEstimator::new(&curriculum.graph, &curriculum.problems, config.entropy.clone())?
                .estimate(&mut student)?;
            print_json(&report)?;
        }
        Commands::KlUcb { .. } => {
            let report = KlUcbEstimator::new(&curriculum.graph, &curriculum.problems, config.kl_ucb.clone())?
                .estimate(&mut student)?;
            print_json(&report)?;
        }
        Commands::Zpdes { init, .. } => {
            let init: Zpd = if init.is_empty() {
                curriculum.graph.basic_traces().clone()
            } else {
                init.into_iter().collect()
            };
            let mut engine = ZpdesEngine::new(&curriculum.graph, &curriculum.problems, &init, config.zpdes.clone())?;
            let summary = run_session(&mut engine, &mut student, config.max_zpdes_trials)?;
            print_json(&summary)?;
        }
        Commands::Pipeline { zpdes_transitions, .. } => {
            let learner_seed = config.seed.map(|s| s.wrapping_add(4));
            let mut learner = SimulatedStudent::from_preset(cli.student, zpdes_transitions, learner_seed);
            let report = run_pipeline(&curriculum, &config, &mut student, &mut learner)?;
            print_json(&report)?;
        }
    }

    info!(status = %student.status(), "finished");
    Ok(())
}

fn apply_overrides(config: &mut SimConfig, command: &Commands) {
    match command {
        Commands::Bayesian { timeout, threshold } => {
            if let Some(v) = timeout {
                config.bayesian.timeout = *v;
            }
            if let Some(v) = threshold {
                config.bayesian.threshold = *v;
            }
        }
        Commands::Entropy {
            entropy_threshold,
            regularisation,
        } => {
            if let Some(v) = entropy_threshold {
                config.entropy.entropy_threshold = *v;
            }
            if let Some(v) = regularisation {
                config.entropy.regularisation = *v;
            }
        }
        Commands::KlUcb {
            timeout,
            lower_threshold,
            p_threshold,
        } => {
            if let Some(v) = timeout {
                config.kl_ucb.timeout = *v;
            }
            if let Some(v) = lower_threshold {
                config.kl_ucb.lower_threshold = *v;
            }
            if let Some(v) = p_threshold {
                config.kl_ucb.p_threshold = *v;
            }
        }
        Commands::Zpdes { d, h, max_trials, .. } => {
            if let Some(v) = d {
                config.zpdes.d = *v;
            }
            if let Some(v) = h {
                config.zpdes.h = *v;
            }
            if let Some(v) = max_trials {
                config.max_zpdes_trials = *v;
            }
        }
        Commands::Pipeline { max_trials, .. } => {
            if let Some(v) = max_trials {
                config.max_zpdes_trials = *v;
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
