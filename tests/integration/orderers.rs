//! Package orderers loaded from solver configuration.

use crate::common::SolverFixture;
use pkgsolve::config::SolverConfig;
use pkgsolve::order::{OrdererRegistry, PackageOrder};

fn fixture(config_toml: &str) -> SolverFixture {
    SolverFixture::with_config(SolverConfig::from_toml_str(config_toml).unwrap())
}

#[test]
fn test_version_split() {
    let fixture = fixture(
        r#"
        [[package_orderers]]
        type = "version_split"
        packages = ["python"]
        first_version = "2.6.0"
        "#,
    );
    fixture.assert_solve(&["python"], &["python-2.6.0[]"]);
    fixture.assert_solve(&["pyfoo"], &["python-2.6.0[]", "pyfoo-3.1.0[]"]);
    fixture.assert_solve(&["python-2.7"], &["python-2.7.0[]"]);
}

#[test]
fn test_sorted_ascending_for_one_family() {
    let fixture = fixture(
        r#"
        [[package_orderers]]
        type = "sorted"
        descending = false
        packages = ["python"]
        "#,
    );
    fixture.assert_solve(&["python"], &["python-2.5.2[]"]);
    fixture.assert_solve(&["pyfoo"], &["python-2.6.0[]", "pyfoo-3.1.0[]"]);
}

#[test]
fn test_sorted_ascending_everywhere() {
    let fixture = fixture(
        r#"
        [[package_orderers]]
        type = "sorted"
        descending = false
        "#,
    );
    fixture.assert_solve(&["pyfoo"], &["python-2.5.2[]", "pyfoo-3.0.0[]"]);
    fixture.assert_solve(&["pysplit"], &["pysplit-5[]"]);
}

#[test]
fn test_per_family() {
    let fixture = fixture(
        r#"
        [[package_orderers]]
        type = "per_family"
        orderers = [{ type = "version_split", first_version = "2.5.2", packages = ["python"] }]
        default_order = { type = "sorted", descending = true }
        "#,
    );
    fixture.assert_solve(&["python"], &["python-2.5.2[]"]);
    fixture.assert_solve(&["pybah"], &["python-2.5.2[]", "pybah-5[]"]);
}

#[test]
fn test_custom_registry() {
    fn oldest_first(_: &toml::Table, _: &OrdererRegistry) -> Result<PackageOrder, pkgsolve::core::SolveError> {
        Ok(PackageOrder::Sorted {
            descending: false,
        })
    }

    let mut registry = OrdererRegistry::with_builtin();
    registry.register("oldest_first", oldest_first);
    assert!(registry.names().contains(&"oldest_first"));

    let config = SolverConfig::from_toml_str(
        r#"
        [[package_orderers]]
        type = "oldest_first"
        packages = ["python"]
        "#,
    )
    .unwrap();
    let orderers = config.orderers(&registry).unwrap();
    assert!(!orderers.is_empty());

    // the built-in registry does not know the tag
    assert!(config.orderers(&OrdererRegistry::with_builtin()).is_err());
}
