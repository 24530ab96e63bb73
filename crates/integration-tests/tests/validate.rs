// Policy validation against the real ambient identity

mod common;

use tempfile::TempDir;

use execdrive_core::application::DriverConfig;
use execdrive_core::error::DriverError;
use execdrive_core::port::identity::IdentityProbe;
use execdrive_system::SystemIdentityProbe;

use common::{driver, init_tracing, system_supervisor, task};

#[tokio::test]
async fn test_validate_against_current_uid() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let current_uid = SystemIdentityProbe.current_uid();
    let expected_err = format!("running as uid {} is disallowed", current_uid);

    struct Case {
        denied: String,
        user: String,
        expect_err: bool,
    }
    let cases = [
        // Allow-all config, explicit numeric user
        Case {
            denied: String::new(),
            user: current_uid.to_string(),
            expect_err: false,
        },
        // Ambient identity denied
        Case {
            denied: current_uid.to_string(),
            user: String::new(),
            expect_err: true,
        },
        // Requested identity denied
        Case {
            denied: current_uid.to_string(),
            user: current_uid.to_string(),
            expect_err: true,
        },
    ];

    for case in cases {
        let driver = driver(system_supervisor());
        driver
            .set_config(DriverConfig {
                enabled: true,
                denied_host_uids: case.denied.clone(),
            })
            .unwrap();

        let mut config = task(dir.path(), "probe", "/bin/sleep", &["45"]);
        config.user = case.user.clone();

        let outcome = driver.validate(&config);
        if case.expect_err {
            assert_eq!(outcome.unwrap_err().to_string(), expected_err);
        } else {
            assert!(outcome.is_ok());
        }
    }
}

#[tokio::test]
async fn test_denied_identity_never_spawns() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let current_uid = SystemIdentityProbe.current_uid();

    let driver = driver(system_supervisor());
    driver
        .set_config(DriverConfig {
            enabled: true,
            denied_host_uids: current_uid.to_string(),
        })
        .unwrap();

    let config = task(dir.path(), "denied", "/bin/sleep", &["45"]);
    let task_id = config.id.clone();

    let err = driver.start_task(config).await.unwrap_err();
    assert!(matches!(err, DriverError::PolicyViolation { .. }));
    assert!(matches!(
        driver.inspect_task(&task_id).unwrap_err(),
        DriverError::TaskNotFound
    ));
    // No log directory means no launch side effects happened
    assert!(!dir.path().join("logs").exists());
}

#[tokio::test]
async fn test_unknown_user_is_rejected_at_start() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let driver = driver(system_supervisor());

    let mut config = task(dir.path(), "ghost", "/bin/sleep", &["45"]);
    config.user = "alice-execdrive-missing".to_string();

    let err = driver.start_task(config).await.unwrap_err();
    assert!(err.to_string().contains("unknown user alice-execdrive-missing"));
}
