//! Resolve scenarios against the shared fixture repository.

use crate::common::SolverFixture;
use pkgsolve::config::SolverConfig;
use pkgsolve::solver::{FailureReason, Resolver, SolverStatus, VariantSelectMode};
use pkgsolve::test_utils::requests;

#[test]
fn test_single_packages() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&[], &[]);
    fixture.assert_solve(&["nada"], &["nada[]"]);
    fixture.assert_solve(&["!nada"], &[]);
    fixture.assert_solve(&["~nada"], &[]);
    fixture.assert_solve(&["~python-2+"], &[]);
    fixture.assert_solve(&["~python"], &[]);
    fixture.assert_solve(&["!python-2.5"], &[]);
    fixture.assert_solve(&["!python"], &[]);
    fixture.assert_solve(&["python"], &["python-2.7.0[]"]);
}

#[test]
fn test_requests_on_one_family() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&["nada", "~nada"], &["nada[]"]);
    fixture.assert_solve(&["nopy"], &["nopy-2.1[]"]);
    fixture.assert_solve(&["python-2.6"], &["python-2.6.8[]"]);
    fixture.assert_solve(&["python-2.6", "!python-2.6.8"], &["python-2.6.0[]"]);
    fixture.assert_solve(&["python-2.6", "python-2.6.5+"], &["python-2.6.8[]"]);
    fixture.assert_solve(&["python", "python-0+<2.6"], &["python-2.5.2[]"]);
    fixture.assert_solve(&["python", "python-0+<2.6.8"], &["python-2.6.0[]"]);
    fixture.assert_solve(&["python", "~python-2.7+"], &["python-2.7.0[]"]);
    fixture.assert_solve(&["!python-2.6+", "python"], &["python-2.5.2[]"]);
}

#[test]
fn test_conflicting_requests() {
    let fixture = SolverFixture::new();

    let reason = fixture.assert_fail(&["nada", "!nada"]);
    assert!(matches!(reason, FailureReason::DependencyConflicts(_)));

    fixture.assert_fail(&["python-2.6", "~python-2.7"]);
    fixture.assert_fail(&["pyfoo", "nada", "!nada"]);
}

#[test]
fn test_dependency_conflicts() {
    let fixture = SolverFixture::new();

    let reason = fixture.assert_fail(&["pybah", "!python"]);
    assert_eq!(reason.to_string(), "(python-2.5|2.6 <--!--> !python)");

    fixture.assert_fail(&["pyfoo-3.1", "python-2.7+"]);
    fixture.assert_fail(&["pyodd<2", "python-2.7"]);
    fixture.assert_fail(&["nopy", "python-2.5.2"]);
}

#[test]
fn test_total_reduction() {
    let fixture = SolverFixture::new();
    let reason = fixture.assert_fail(&["bahish", "pybah<5"]);
    assert!(reason.description().starts_with("A package was completely reduced:"));
}

#[test]
fn test_multiple_families() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&["nada", "nopy"], &["nada[]", "nopy-2.1[]"]);
    fixture.assert_solve(&["pyfoo"], &["python-2.6.8[]", "pyfoo-3.1.0[]"]);
    fixture.assert_solve(&["pybah"], &["python-2.5.2[]", "pybah-5[]"]);
    fixture.assert_solve(&["nopy", "python"], &["nopy-2.1[]", "python-2.7.0[]"]);
    fixture.assert_solve(&["pybah", "!python-2.5"], &["python-2.6.8[]", "pybah-4[]"]);
    fixture.assert_solve(&["pybah", "!python-2.5", "python<2.6.8"], &["python-2.6.0[]", "pybah-4[]"]);
    fixture.assert_solve(&["python", "pybah"], &["python-2.6.8[]", "pybah-4[]"]);
}

#[test]
fn test_backtracking() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&["python", "pyodd"], &["python-2.6.8[]", "pybah-4[]", "pyodd-2[]"]);
    fixture.assert_solve(&["pybah", "pyodd"], &["python-2.5.2[]", "pybah-5[]", "pyodd-2[]"]);
    fixture.assert_solve(&["pysplit", "python-2.5"], &["pysplit-5[]", "python-2.5.2[]"]);
    fixture.assert_solve(&["~python<2.6", "pysplit"], &["pysplit-5[]"]);
    fixture.assert_solve(&["python", "bahish", "pybah"], &["python-2.5.2[]", "pybah-5[]", "bahish-2[]"]);
}

#[test]
fn test_cycles() {
    let fixture = SolverFixture::new();
    for request in ["pymum-1", "pydad-1", "pyson-1", "pymum-3", "pydad-3"] {
        let reason = fixture.assert_fail(&[request]);
        assert!(matches!(reason, FailureReason::Cycle(_)), "{request} should fail with a cycle, got {reason}");
    }

    let reason = fixture.assert_fail(&["pymum-2"]);
    assert!(!matches!(reason, FailureReason::Cycle(_)));
}

#[test]
fn test_variant_version_priority() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&["pyvariants", "python"], &["python-2.7.0[]", "pyvariants-2[0]"]);
    fixture.assert_solve(&["pyvariants", "python", "nada"], &["python-2.7.0[]", "pyvariants-2[0]", "nada[]"]);
}

#[test]
fn test_variant_intersection_priority() {
    let fixture = SolverFixture::with_config(SolverConfig {
        variant_select_mode: VariantSelectMode::IntersectionPriority,
        ..SolverConfig::default()
    });
    fixture.assert_solve(&["pyvariants", "python"], &["python-2.7.0[]", "pyvariants-2[0]"]);
    fixture.assert_solve(&["pyvariants", "python", "nada"], &["python-2.6.8[]", "nada[]", "pyvariants-2[1]"]);
}

#[test]
fn test_variant_selection_follows_requests() {
    let fixture = SolverFixture::new();
    fixture.assert_solve(&["pyvariants", "python-2.6"], &["python-2.6.8[]", "nada[]", "pyvariants-2[1]"]);
    fixture.assert_fail(&["pyvariants", "python-2.6", "!nada"]);
}

const LIB_REPOSITORY_TOML: &str = r#"
[[package]]
name = "lib"
version = "1.0"

[[package]]
name = "lib"
version = "1.5"

[[package]]
name = "lib"
version = "2.0"

[[package]]
name = "app"
version = "1"
requires = ["lib-1+<2"]

[[package]]
name = "py"
version = "2.6.1"

[[package]]
name = "py"
version = "2.7.2"

[[package]]
name = "vapp"
version = "1"
variants = [["py-2.6"], ["py-2.7"]]
"#;

#[test]
fn test_latest_version_in_required_range() {
    let fixture = SolverFixture::with_repository(LIB_REPOSITORY_TOML);
    fixture.assert_solve(&["app"], &["lib-1.5[]", "app-1[]"]);
}

#[test]
fn test_request_outside_required_range() {
    let fixture = SolverFixture::with_repository(LIB_REPOSITORY_TOML);
    let reason = fixture.assert_fail(&["app", "lib-2"]);
    assert!(matches!(reason, FailureReason::DependencyConflicts(_)));
    assert!(reason.to_string().starts_with("(lib-1+<2 <--!--> lib"), "unexpected reason {reason}");
}

#[test]
fn test_variant_reduced_without_split() {
    let fixture = SolverFixture::with_repository(LIB_REPOSITORY_TOML);
    fixture.assert_solve(&["vapp", "py-2.7"], &["py-2.7.2[]", "vapp-1[1]"]);

    let requests = requests(&["vapp", "py-2.7"]);
    let mut resolver = Resolver::new(&requests, &fixture.repo, &fixture.config).unwrap();
    resolver.solve().unwrap();
    assert_eq!(resolver.status(), SolverStatus::Solved);
    assert_eq!(resolver.num_solves(), 1);
    assert_eq!(resolver.phases().len(), 1);
}

#[test]
fn test_repeated_resolves_are_identical() {
    let fixture = SolverFixture::new();
    let outcome_json = |reqs: &[&str]| {
        let requests = requests(reqs);
        let mut resolver = Resolver::new(&requests, &fixture.repo, &fixture.config).unwrap();
        resolver.solve().unwrap();
        serde_json::to_string(&resolver.outcome(true).unwrap()).unwrap()
    };

    for reqs in [&["python", "bahish", "pybah"][..], &["pybah", "!python"], &["pyvariants", "python-2.6"]] {
        assert_eq!(outcome_json(reqs), outcome_json(reqs), "outcome of {reqs:?}");
    }
}
