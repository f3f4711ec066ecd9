// Provisioning tests: resolution, database naming, fork-join and extra data sources
mod common;

use common::{FakePlatform, FlagIndexSetup, RecordingStarter, Rendezvous};
use dbstage::docker::DockerPlatform;
use dbstage::properties::{DB_NAME, DEBUG, PLATFORM};
use dbstage::search::NoIndexSetup;
use dbstage::{
    DbStageError, KnownPlatforms, Properties, ProvisionOutcome, ProvisioningCoordinator,
    ServerConfig, SkipReason,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    platform: Arc<FakePlatform>,
    index: Arc<FlagIndexSetup>,
    starter: Arc<RecordingStarter>,
    coordinator: ProvisioningCoordinator,
}

fn harness(name: &str, platform: FakePlatform, index: FlagIndexSetup) -> Harness {
    let platform = Arc::new(platform);
    let index = Arc::new(index);
    let starter = Arc::new(RecordingStarter::default());
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::empty().with(name, platform.clone()),
        index.clone(),
        starter.clone(),
    );
    Harness {
        platform,
        index,
        starter,
        coordinator,
    }
}

fn server(pairs: &[(&str, &str)]) -> ServerConfig {
    ServerConfig::with_properties(Properties::from_pairs(pairs.iter().copied()))
}

#[test]
fn test_unknown_platforms_have_no_side_effects() {
    for unknown in ["db2", "POSTGRES", "mariadb", "fake2", "sql server"] {
        let h = harness("fake", FakePlatform::with_container(), FlagIndexSetup::default());
        let mut server = server(&[(PLATFORM, unknown)]);

        let outcome = h.coordinator.run(None, &mut server).unwrap();

        assert_eq!(
            outcome,
            ProvisionOutcome::Skipped {
                reason: SkipReason::UnknownPlatform(unknown.to_string())
            }
        );
        assert_eq!(h.platform.setup_calls(), 0);
        assert_eq!(h.index.calls(), 0);
        assert_eq!(h.starter.count(), 0);
        assert!(server.data_source.is_none());
    }
}

#[test]
fn test_local_platform_defaults_database_name() {
    let h = harness("fake", FakePlatform::local(), FlagIndexSetup::default());
    let mut server = server(&[(PLATFORM, "fake")]);

    h.coordinator.run(None, &mut server).unwrap();

    let seen = h.platform.last_seen().unwrap();
    assert_eq!(seen.database_name, "test_db");
    assert_eq!(seen.db, "db");
    assert_eq!(server.data_source.unwrap().url, "fake://test_db");
}

#[test]
fn test_remote_platform_requires_database_name() {
    let h = harness("fake", FakePlatform::with_container(), FlagIndexSetup::default());
    let mut server = server(&[(PLATFORM, "fake")]);

    let err = h.coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::Config(_)));
    assert!(err.to_string().contains("ebean.test.dbName is not set"));
    assert_eq!(h.platform.setup_calls(), 0);
    assert_eq!(h.index.calls(), 0);
    assert_eq!(h.starter.count(), 0);
}

#[test]
fn test_db_hint_selects_platform() {
    let platform = Arc::new(FakePlatform::local());
    let other = Arc::new(FakePlatform::local());
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::empty()
            .with("alpha", platform.clone())
            .with("beta", other.clone()),
        Arc::new(NoIndexSetup),
        Arc::new(RecordingStarter::default()),
    );
    let mut server = server(&[(PLATFORM, "beta")]);

    let outcome = coordinator.run(Some("alpha"), &mut server).unwrap();

    assert!(matches!(
        outcome,
        ProvisionOutcome::Provisioned { ref platform, ref db, .. } if platform == "alpha" && db == "alpha"
    ));
    assert_eq!(platform.setup_calls(), 1);
    assert_eq!(other.setup_calls(), 0);
}

#[test]
fn test_both_branches_run_concurrently_and_complete() {
    let rendezvous = Arc::new(Rendezvous::default());
    let platform = FakePlatform {
        rendezvous: Some(rendezvous.clone()),
        delay: Duration::from_millis(20),
        ..FakePlatform::local()
    };
    let index = FlagIndexSetup {
        rendezvous: Some(rendezvous),
        delay: Duration::from_millis(40),
        ..Default::default()
    };
    let h = harness("fake", platform, index);
    let mut server = server(&[(PLATFORM, "fake")]);

    h.coordinator.run(None, &mut server).unwrap();

    assert!(h.platform.completed());
    assert!(h.index.completed());
    assert!(h.platform.met_other_branch.load(std::sync::atomic::Ordering::SeqCst));
    assert!(h.index.met_other_branch.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn test_container_started_with_docker_properties() {
    let h = harness("fake", FakePlatform::with_container(), FlagIndexSetup::default());
    let mut server = server(&[(PLATFORM, "fake"), (DB_NAME, "orders"), (DEBUG, "TRUE")]);

    let outcome = h.coordinator.run(None, &mut server).unwrap();

    let (props, platform) = h.starter.last().unwrap();
    assert_eq!(platform, DockerPlatform::Postgres);
    assert_eq!(props.get("postgres.containerName"), Some("ut_fake"));
    match outcome {
        ProvisionOutcome::Provisioned {
            database_name,
            container,
            ..
        } => {
            assert_eq!(database_name, "orders");
            let container = container.unwrap();
            assert_eq!(container.name, "ut_fake");
            assert_eq!(container.port, 6432);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_index_failure_waits_for_database_branch() {
    let platform = FakePlatform {
        delay: Duration::from_millis(100),
        ..FakePlatform::local()
    };
    let index = FlagIndexSetup {
        fail: true,
        ..Default::default()
    };
    let h = harness("fake", platform, index);
    let mut server = server(&[(PLATFORM, "fake")]);

    let err = h.coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::IndexSetup(_)));
    assert!(h.platform.completed());
    assert!(server.data_source.is_none());
}

#[test]
fn test_database_failure_waits_for_index_branch() {
    let platform = FakePlatform {
        fail: Some("cannot create schema".to_string()),
        ..FakePlatform::local()
    };
    let index = FlagIndexSetup {
        delay: Duration::from_millis(100),
        ..Default::default()
    };
    let h = harness("fake", platform, index);
    let mut server = server(&[(PLATFORM, "fake")]);

    let err = h.coordinator.run(None, &mut server).unwrap_err();

    assert!(err.to_string().contains("cannot create schema"));
    assert!(h.index.completed());
}

#[test]
fn test_both_failures_report_index_error() {
    let platform = FakePlatform {
        fail: Some("db down".to_string()),
        ..FakePlatform::local()
    };
    let index = FlagIndexSetup {
        fail: true,
        ..Default::default()
    };
    let h = harness("fake", platform, index);
    let mut server = server(&[(PLATFORM, "fake")]);

    let err = h.coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::IndexSetup(_)));
    assert!(h.platform.completed());
}

#[test]
fn test_panicking_branch_is_reported_after_join() {
    let platform = FakePlatform {
        panic: true,
        ..FakePlatform::local()
    };
    let index = FlagIndexSetup {
        delay: Duration::from_millis(50),
        ..Default::default()
    };
    let h = harness("fake", platform, index);
    let mut server = server(&[(PLATFORM, "fake")]);

    let err = h.coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::BranchPanicked("database")));
    assert!(h.index.completed());
}

#[test]
fn test_container_failure_propagates() {
    let platform = Arc::new(FakePlatform::with_container());
    let starter = Arc::new(RecordingStarter {
        fail: true,
        ..Default::default()
    });
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::empty().with("fake", platform),
        Arc::new(NoIndexSetup),
        starter.clone(),
    );
    let mut server = server(&[(PLATFORM, "fake"), (DB_NAME, "orders")]);

    let err = coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::Docker(_)));
    assert_eq!(starter.count(), 1);
}

#[test]
fn test_extra_data_source_never_starts_containers() {
    let h = harness("fake", FakePlatform::with_container(), FlagIndexSetup::default());
    let mut server = ServerConfig::new(
        "reports",
        Properties::from_pairs([(PLATFORM, "fake"), (DB_NAME, "orders")]),
    );

    let outcome = h
        .coordinator
        .configure_extra_data_source(None, &mut server)
        .unwrap();

    assert!(matches!(outcome, ProvisionOutcome::ExtraDataSource { .. }));
    assert_eq!(h.platform.extra_calls(), 1);
    assert_eq!(h.platform.setup_calls(), 0);
    assert_eq!(h.index.calls(), 0);
    assert_eq!(h.starter.count(), 0);

    let seen = h.platform.last_seen().unwrap();
    assert_eq!(seen.db, "reports");
    assert_eq!(seen.database_name, "reports");
    assert_eq!(server.data_source.unwrap().url, "fake://reports");
}

#[test]
fn test_extra_data_source_unknown_platform_is_skipped() {
    let h = harness("fake", FakePlatform::local(), FlagIndexSetup::default());
    let mut server = ServerConfig::new("reports", Properties::from_pairs([(PLATFORM, "nope")]));

    let outcome = h
        .coordinator
        .configure_extra_data_source(None, &mut server)
        .unwrap();

    assert!(outcome.is_skipped());
    assert_eq!(h.platform.extra_calls(), 0);
}

// ============ Standard platform examples ============

#[test]
fn test_example_h2() {
    let starter = Arc::new(RecordingStarter::default());
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::standard(),
        Arc::new(NoIndexSetup),
        starter.clone(),
    );
    let mut server = server(&[(PLATFORM, "h2")]);

    let outcome = coordinator.run(None, &mut server).unwrap();

    match outcome {
        ProvisionOutcome::Provisioned {
            platform,
            db,
            database_name,
            container,
            ..
        } => {
            assert_eq!(platform, "h2");
            assert_eq!(db, "db");
            assert_eq!(database_name, "test_db");
            assert!(container.is_none());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(starter.count(), 0);
}

#[test]
fn test_example_postgres_without_db_name() {
    let starter = Arc::new(RecordingStarter::default());
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::standard(),
        Arc::new(NoIndexSetup),
        starter.clone(),
    );
    let mut server = server(&[(PLATFORM, "postgres")]);

    let err = coordinator.run(None, &mut server).unwrap_err();

    assert!(matches!(err, DbStageError::Config(_)));
    assert_eq!(starter.count(), 0);
}

#[test]
fn test_example_postgres_with_db_name() {
    let index = Arc::new(FlagIndexSetup::default());
    let starter = Arc::new(RecordingStarter::default());
    let coordinator = ProvisioningCoordinator::new(
        KnownPlatforms::standard(),
        index.clone(),
        starter.clone(),
    );
    let mut server = server(&[(PLATFORM, "postgres"), (DB_NAME, "orders")]);

    let outcome = coordinator.run(None, &mut server).unwrap();

    assert!(matches!(
        outcome,
        ProvisionOutcome::Provisioned { ref database_name, .. } if database_name == "orders"
    ));
    assert!(index.completed());

    let (props, platform) = starter.last().unwrap();
    assert_eq!(platform, DockerPlatform::Postgres);
    assert_eq!(props.get("postgres.dbName"), Some("orders"));
    assert_eq!(props.get("postgres.port"), Some("6432"));

    let ds = server.data_source.unwrap();
    assert_eq!(ds.url, "jdbc:postgresql://localhost:6432/orders");
}
