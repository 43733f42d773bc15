use super::*;
use crate::config::SolverConfig;
use crate::core::SolveError;
use crate::test_utils::{fixture_repository, init_test_logging, requests};
use std::cell::Cell;

fn names(resolver: &Resolver<'_>) -> Vec<String> {
    resolver.resolved_packages().unwrap_or_default().iter().map(ToString::to_string).collect()
}

#[test]
fn test_step_by_step() {
    init_test_logging(None);
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &SolverConfig::default()).unwrap();
    assert_eq!(resolver.status(), SolverStatus::Unsolved);
    assert_eq!(resolver.num_solves(), 0);

    resolver.solve_step().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Unsolved);
    assert_eq!(resolver.phases().last().unwrap().status(), SolverStatus::Exhausted);

    resolver.solve_step().unwrap();
    resolver.solve_step().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Solved);
    assert_eq!(resolver.num_solves(), 3);
    assert_eq!(resolver.num_fails(), 0);
    assert_eq!(names(&resolver), vec!["python-2.6.8[]", "pyfoo-3.1.0[]"]);
    assert_eq!(resolver.to_string(), "solved {2,0} [python==2.6.8] [pyfoo==3.1.0]");

    // a finished resolver ignores further steps
    resolver.solve_step().unwrap();
    assert_eq!(resolver.num_solves(), 3);
    assert!(matches!(resolver.solve(), Err(SolveError::SolveAlreadyStarted)));
}

#[test]
fn test_dump() {
    let repo = fixture_repository();
    let mut resolver =
        Resolver::new(&requests(&["python", "bahish", "pybah"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();

    let dump = resolver.dump();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "status: solved (The solve has completed successfully.)");
    assert_eq!(lines[1], "initial request: python bahish pybah");
    assert_eq!(lines[3], "solve stack:");
    assert!(lines[4].starts_with("{0,5}  solved"));
    assert!(dump.contains("previous failures:"));
    assert!(dump.contains("#0"));
}

#[test]
fn test_request_conflict_fails_immediately() {
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["nada", "!nada"]), &repo, &SolverConfig::default()).unwrap();
    assert_eq!(resolver.status(), SolverStatus::Failed);

    resolver.solve().unwrap();
    assert_eq!(resolver.num_solves(), 0);
    assert_eq!(resolver.num_fails(), 1);
    assert_eq!(
        resolver.failure_description(None).unwrap(),
        "The following package conflicts occurred: (nada <--!--> !nada)"
    );

    let involved: Vec<String> = resolver.failure_packages(None).unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(involved, vec!["nada", "!nada"]);

    assert!(resolver.failure_reason(Some(-1)).is_ok());
    assert!(matches!(
        resolver.failure_reason(Some(1)),
        Err(SolveError::FailureIndexOutOfRange {
            index: 1,
            available: 1
        })
    ));
    assert!(resolver.failure_reason(Some(-2)).is_err());

    resolver.reset().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Failed);
}

#[test]
fn test_missing_request_is_fatal() {
    let repo = fixture_repository();
    let result = Resolver::new(&requests(&["python-3"]), &repo, &SolverConfig::default());
    assert!(matches!(result, Err(SolveError::PackageNotFound { .. })));

    let result = Resolver::new(&requests(&["pyhton"]), &repo, &SolverConfig::default());
    match result {
        Err(SolveError::PackageFamilyNotFound {
            similar, ..
        }) => assert!(similar.contains(&"python".to_string())),
        other => panic!("expected family not found, got {other:?}"),
    }
}

#[test]
fn test_cycle() {
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["pymum-1"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();

    assert_eq!(resolver.status(), SolverStatus::Failed);
    assert!(resolver.cyclic_fail());
    assert!(resolver.resolved_packages().is_none());
    assert_eq!(
        resolver.failure_reason(None).unwrap().to_string(),
        "pymum-1 --> pydad-1 --> pyson-1 --> pymum-1"
    );

    let graph = resolver.get_graph().unwrap();
    assert_eq!(graph.edges_of_kind(EdgeKind::Cycle).count(), 3);
}

#[test]
fn test_backtracking_records_failures() {
    let repo = fixture_repository();
    let mut resolver =
        Resolver::new(&requests(&["python", "bahish", "pybah"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();

    assert_eq!(resolver.status(), SolverStatus::Solved);
    assert_eq!(names(&resolver), vec!["python-2.5.2[]", "pybah-5[]", "bahish-2[]"]);
    assert_eq!(resolver.failed_phases().len(), resolver.num_fails());

    // python-2.6.8 and python-2.6.0 are both rejected
    assert_eq!(resolver.num_fails(), 2);
    assert!(resolver.failure_reason(None).is_ok());
    assert!(resolver.failure_description(Some(0)).is_ok());
}

#[test]
fn test_max_fails_forces_failure() {
    let repo = fixture_repository();
    let config = SolverConfig {
        max_fails: Some(1),
        ..SolverConfig::default()
    };
    let mut resolver = Resolver::new(&requests(&["python", "bahish", "pybah"]), &repo, &config).unwrap();
    resolver.solve().unwrap();

    assert_eq!(resolver.status(), SolverStatus::Failed);
    assert_eq!(resolver.num_fails(), 1);
    let description = resolver.failure_description(None).unwrap();
    assert!(description.starts_with("fail limit reached: aborted after 1 failures:\n"));

    match resolver.outcome(true).unwrap() {
        ResolveOutcome::Failed(failure) => {
            assert_eq!(failure.status, SolverStatus::Failed);
            assert_eq!(failure.rejected_phases.len(), 1);
            assert!(failure.reason.is_some());
            assert!(!failure.involved.is_empty());
            assert!(failure.graph.is_some());
        }
        ResolveOutcome::Solved {
            ..
        } => panic!("expected a failure"),
    }
}

#[test]
fn test_time_limit_aborts() {
    let repo = fixture_repository();
    let config = SolverConfig {
        time_limit_secs: Some(0.0),
        ..SolverConfig::default()
    };
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &config).unwrap();
    resolver.solve().unwrap();

    assert_eq!(resolver.status(), SolverStatus::Unsolved);
    assert_eq!(resolver.num_solves(), 1);
    assert!(resolver.abort_reason().unwrap().starts_with("time limit exceeded"));
}

#[test]
fn test_callback_abort() {
    let repo = fixture_repository();
    let seen = Cell::new(0);
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &SolverConfig::default())
        .unwrap()
        .with_callback(Box::new(|state: &SolverState| {
            seen.set(seen.get() + 1);
            assert_eq!(state.num_solves, 1);
            assert_eq!(state.num_fails, 0);
            CallbackReturn::Abort("enough".to_string())
        }));
    resolver.solve().unwrap();

    assert_eq!(seen.get(), 1);
    assert_eq!(resolver.status(), SolverStatus::Unsolved);
    assert_eq!(resolver.abort_reason(), Some("enough"));

    match resolver.outcome(false).unwrap() {
        ResolveOutcome::Failed(failure) => {
            assert_eq!(failure.status, SolverStatus::Unsolved);
            assert_eq!(failure.description, "enough");
            assert!(failure.rejected_phases.is_empty());
        }
        ResolveOutcome::Solved {
            ..
        } => panic!("expected an aborted resolve"),
    }
}

#[test]
fn test_callback_fail_needs_a_failure() {
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &SolverConfig::default())
        .unwrap()
        .with_callback(Box::new(|_: &SolverState| CallbackReturn::Fail("give up".to_string())));
    resolver.solve().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Solved);

    let mut resolver = Resolver::new(&requests(&["python", "bahish", "pybah"]), &repo, &SolverConfig::default())
        .unwrap()
        .with_callback(Box::new(|_: &SolverState| CallbackReturn::Fail("give up".to_string())));
    resolver.solve().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Failed);
    assert!(resolver.failure_description(None).unwrap().starts_with("give up:\n"));
}

#[test]
fn test_reset() {
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Solved);

    resolver.reset().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Unsolved);
    assert_eq!(resolver.num_solves(), 0);
    assert_eq!(resolver.phases().len(), 1);

    resolver.solve().unwrap();
    assert_eq!(names(&resolver), vec!["python-2.6.8[]", "pyfoo-3.1.0[]"]);
}

#[test]
fn test_solved_graph() {
    let repo = fixture_repository();
    let mut resolver = Resolver::new(&requests(&["pyfoo"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();

    let graph = resolver.get_graph().unwrap();
    assert_eq!(graph.node("pyfoo").unwrap().kind, NodeKind::InitialRequest);
    assert_eq!(graph.node("python-2.6.8[]").unwrap().kind, NodeKind::SolvedScope);
    assert!(graph.edge("pyfoo", "pyfoo-3.1.0[]").is_some());
    assert!(graph.edge("pyfoo-3.1.0[]", "python-2.6").is_some());
    assert!(graph.edge("python-2.6", "python-2.6.8[]").is_some());
    assert!(resolver.get_fail_graph(None).is_err());
}

#[test]
fn test_failure_graph() {
    let repo = fixture_repository();
    let mut resolver =
        Resolver::new(&requests(&["pyfoo-3.1", "python-2.7+"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Failed);

    let graph = resolver.get_graph().unwrap();
    let conflict = graph.edges_of_kind(EdgeKind::Conflict).next().unwrap();
    assert_eq!(graph.nodes[conflict.source].label, "python-2.6");
    assert!(graph.to_json().unwrap().contains("\"conflict\""));
}

#[test]
fn test_outcome_solved() {
    let repo = fixture_repository();
    let mut resolver =
        Resolver::new(&requests(&["pyvariants", "python"]), &repo, &SolverConfig::default()).unwrap();
    resolver.solve().unwrap();

    let outcome = resolver.outcome(true).unwrap();
    let ResolveOutcome::Solved {
        packages,
    } = &outcome
    else {
        panic!("expected a solved outcome");
    };
    let shown: Vec<String> = packages.iter().map(ToString::to_string).collect();
    assert_eq!(shown, vec!["python-2.7.0", "pyvariants-2[0]"]);
    assert_eq!(packages[1].location, "memory");

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["result"], "solved");
    assert_eq!(json["packages"][1]["index"], 0);
    assert!(json["packages"][0].get("index").is_none());
}

#[test]
fn test_debug_output() {
    let repo = fixture_repository();
    let resolver = Resolver::new(&requests(&["pyodd"]), &repo, &SolverConfig::default()).unwrap();
    let debug = format!("{resolver:?}");
    assert!(debug.starts_with("Resolver"));
    assert!(debug.contains("num_solves: 0"));
}
