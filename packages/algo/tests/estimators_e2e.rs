//! End-to-end runs of the four estimators against scripted learners.

mod common;

use common::{graph, single_problems, KnownTraces};
use zpd_algo::{
    bayesian_zpd, entropy_zpd, kl_ucb_zpd, BayesianConfig, Colour, ConfigurationError, EntropyConfig,
    EntropyEstimator, KlUcbConfig, KlUcbEstimator, Problem, TraceProblems, Zpd, ZpdError, ZpdesConfig,
    ZpdesEngine,
};

fn zpd(items: &[&str]) -> Zpd {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn zpdes_unlocks_successor_after_graduation() {
    let graph = graph(&[("", &["A"]), ("A", &["AB"])]);
    let mut problems = TraceProblems::new();
    problems.insert("A".to_string(), vec![Problem::new(1, 1, 2, "A")]);
    problems.insert("AB".to_string(), vec![Problem::new(1, 1, 2, "AB")]);

    let config = ZpdesConfig {
        d: 4,
        h: 0.75,
        seed: Some(1),
        ..ZpdesConfig::default()
    };
    let mut engine = ZpdesEngine::new(&graph, &problems, &zpd(&["A"]), config).unwrap();
    let mut oracle = KnownTraces::new(&["A", "AB"]);

    let mut graduated_at = None;
    while let Some(outcome) = engine.step(&mut oracle).unwrap() {
        if outcome.trace == "A" && outcome.graduated {
            assert!(outcome.accuracy >= 0.75);
            graduated_at = Some(engine.trials());
            assert_eq!(engine.active_traces().cloned().collect::<Zpd>(), zpd(&["AB"]));
        }
    }

    assert_eq!(graduated_at, Some(3));
    assert_eq!(engine.trials(), 6);
    assert_eq!(oracle.asked, vec!["A", "A", "A", "AB", "AB", "AB"]);
}

#[test]
fn entropy_colours_solvable_and_unsolvable() {
    let graph = graph(&[("", &["A"]), ("A", &["B"])]);
    let problems = single_problems(&graph);
    let mut oracle = KnownTraces::new(&["A"]);

    let report = EntropyEstimator::new(&graph, &problems, EntropyConfig::default())
        .unwrap()
        .estimate(&mut oracle)
        .unwrap();

    assert_eq!(report.colours["A"], Colour::Solvable);
    assert_eq!(report.colours["B"], Colour::Unsolvable);
    assert!(report.problems_asked < 100);
    assert_eq!(report.zpd, zpd(&["A", "B"]));
}

#[test]
fn estimators_agree_on_a_learner_who_knows_nothing() {
    let graph = graph(&[("", &["A", "B"]), ("A", &["AB"]), ("B", &["AB"])]);
    let problems = single_problems(&graph);

    let entropy = entropy_zpd(&graph, &problems, EntropyConfig::default(), &mut KnownTraces::new(&[])).unwrap();
    assert_eq!(entropy, zpd(&["A", "B"]));

    let bayesian = BayesianConfig {
        threshold: 1.0,
        seed: Some(3),
        ..BayesianConfig::default()
    };
    let bayesian = bayesian_zpd(&graph, &problems, bayesian, &mut KnownTraces::new(&[])).unwrap();
    assert_eq!(bayesian, zpd(&["A", "B"]));

    let kl_ucb = KlUcbConfig {
        timeout: 25,
        ..KlUcbConfig::default()
    };
    let kl_ucb = kl_ucb_zpd(&graph, &problems, kl_ucb, &mut KnownTraces::new(&[])).unwrap();
    assert_eq!(kl_ucb, zpd(&["A", "B"]));
}

#[test]
fn kl_ucb_asks_the_first_queued_problem_only() {
    let graph = graph(&[("", &["A"]), ("A", &["AB"])]);
    let mut problems = TraceProblems::new();
    problems.insert(
        "A".to_string(),
        vec![Problem::new(1, 1, 2, "A"), Problem::new(9, 9, 18, "other")],
    );
    problems.insert("AB".to_string(), vec![Problem::new(1, 1, 2, "AB")]);

    let config = KlUcbConfig {
        timeout: 10,
        ..KlUcbConfig::default()
    };
    let mut oracle = KnownTraces::new(&["A"]);
    let report = KlUcbEstimator::new(&graph, &problems, config)
        .unwrap()
        .estimate(&mut oracle)
        .unwrap();

    assert!(oracle.asked.iter().all(|t| t == "A"));
    assert_eq!(report.problems_asked(), oracle.asked.len());
    assert_eq!(report.rounds, 10);
}

#[test]
fn configuration_errors_fail_fast() {
    let graph = graph(&[("", &["A"]), ("A", &["AB"])]);
    let mut problems = single_problems(&graph);
    problems.insert("AB".to_string(), Vec::new());

    let mut oracle = KnownTraces::new(&["A"]);
    let result = entropy_zpd(&graph, &problems, EntropyConfig::default(), &mut oracle);
    assert!(matches!(
        result,
        Err(ZpdError::Configuration(ConfigurationError::EmptyProblems { ref trace })) if trace == "AB"
    ));
    assert!(oracle.asked.is_empty());
}
