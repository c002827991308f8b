//! End-to-end deployment tests: bundle in, control-plane state out.

mod common;

use bundle_deploy::api::RecordingLogger;
use bundle_deploy::bundle::{BundleData, BundleParser};
use bundle_deploy::changes::Outcome;
use bundle_deploy::error::{BundleError, ConfigError, ControlPlaneError, DeployError};
use bundle_deploy::{BundleDeployer, DeploymentPlan};
use common::FakeControlPlane;

const BUNDLE: &str = r"
series: trusty
services:
  mysql:
    charm: cs:mysql-10
    num_units: 1
    to: ['1']
  wordpress:
    charm: cs:trusty/wordpress
    num_units: 2
    options:
      tuning: optimized
    annotations:
      gui-x: '100'
machines:
  1:
    constraints: mem=4G
    annotations:
      rack: a
relations:
  - [wordpress:db, mysql:db]
";

fn bundle(yaml: &str) -> BundleData {
    BundleParser::new().parse_yaml(yaml, None).unwrap()
}

#[tokio::test]
async fn test_deploy_bundle() {
    let fake = FakeControlPlane::new();
    let log = RecordingLogger::new();

    let report = BundleDeployer::new(&fake, &log)
        .deploy(&bundle(BUNDLE))
        .await
        .unwrap();

    assert_eq!(report.bundle_hash.as_ref().map(String::len), Some(64));
    assert_eq!(report.reused(), 0);
    assert!(report.finished_at >= report.started_at);

    assert_eq!(
        fake.services(),
        vec![String::from("mysql"), String::from("wordpress")]
    );
    assert_eq!(
        fake.service_charm("mysql").as_deref(),
        Some("cs:trusty/mysql-10")
    );
    assert_eq!(
        fake.service_charm("wordpress").as_deref(),
        Some("cs:trusty/wordpress-1")
    );
    assert_eq!(
        fake.relations(),
        vec![(String::from("mysql:db"), String::from("wordpress:db"))]
    );

    let units = fake.units();
    assert_eq!(units.len(), 3);
    let mysql = units.iter().find(|(s, _)| s == "mysql").unwrap();
    assert_eq!(mysql.1.machine.as_deref(), Some("1"));

    assert_eq!(fake.annotations("service-wordpress").unwrap()["gui-x"], "100");
    assert_eq!(fake.annotations("machine-1").unwrap()["rack"], "a");
}

#[tokio::test]
async fn test_redeploy_is_idempotent() {
    let fake = FakeControlPlane::new();
    let log = RecordingLogger::new();
    let deployer = BundleDeployer::new(&fake, &log);
    let bundle = bundle(BUNDLE);

    deployer.deploy(&bundle).await.unwrap();
    let machines = fake.machines().len();
    fake.clear_calls();

    let report = deployer.deploy(&bundle).await.unwrap();

    assert_eq!(fake.count("add_machine"), 0);
    assert_eq!(fake.count("add_unit"), 0);
    assert_eq!(fake.count("set_service_charm"), 0);
    assert_eq!(fake.machines().len(), machines);
    assert_eq!(fake.units().len(), 3);
    assert_eq!(fake.relations().len(), 1);

    // Two services, one relation, one machine and three units.
    assert_eq!(report.reused(), 7);
    assert!(
        report
            .outcomes
            .iter()
            .any(|o| o.outcome == Outcome::AlreadyRelated)
    );
}

#[tokio::test]
async fn test_invalid_bundle_makes_no_calls() {
    let fake = FakeControlPlane::new();
    let log = RecordingLogger::new();

    let err = BundleDeployer::new(&fake, &log)
        .deploy(&bundle(
            r"
services:
  wordpress:
    charm: cs:trusty/wordpress
relations:
  - [wordpress:db, mysql:db]
",
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BundleError::Config(ConfigError::ValidationError { .. })
    ));
    assert!(fake.calls().is_empty());
    assert!(log.lines().is_empty());
}

#[tokio::test]
async fn test_failure_reports_change_id() {
    let fake = FakeControlPlane::new();
    let log = RecordingLogger::new();
    fake.fail_next(
        "add_relation",
        ControlPlaneError::Unauthorized {
            message: String::from("permission denied"),
        },
    );

    let err = BundleDeployer::new(&fake, &log)
        .deploy(&bundle(BUNDLE))
        .await
        .unwrap_err();

    let deploy = err.as_deploy().unwrap();
    assert_eq!(deploy.change_id(), Some("addRelation-5"));
    assert!(matches!(
        deploy.root(),
        DeployError::Operation {
            source: ControlPlaneError::Unauthorized { .. },
            ..
        }
    ));
    assert_eq!(fake.services().len(), 2);
    assert!(fake.units().is_empty());
}

#[tokio::test]
async fn test_apply_plan_from_change_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("changes.json");

    let plan = DeploymentPlan::from_bundle(&bundle(BUNDLE)).unwrap();
    let records: Vec<_> = plan
        .changes
        .iter()
        .map(bundle_deploy::changes::ChangeRecord::from)
        .collect();
    std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    let changes = BundleParser::new().load_changes(&path).unwrap();
    assert_eq!(changes, plan.changes);

    let fake = FakeControlPlane::new();
    let log = RecordingLogger::new();
    let report = BundleDeployer::new(&fake, &log)
        .apply_changes(None, &changes)
        .await
        .unwrap();

    assert!(report.bundle_hash.is_none());
    assert_eq!(report.outcomes.len(), plan.changes.len());
    assert_eq!(fake.services().len(), 2);
}
