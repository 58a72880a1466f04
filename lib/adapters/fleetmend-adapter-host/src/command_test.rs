#![cfg(unix)]

use std::time::Duration;

use crate::command::{CommandRunner, on_path};
use crate::error::ActuatorError;

#[tokio::test]
async fn nonzero_exit_is_a_command_failure() {
    let runner = CommandRunner::default();
    let err = runner
        .run("sh", &["-c", "echo out; echo boom >&2; exit 3"])
        .await
        .unwrap_err();
    match err {
        ActuatorError::CommandFailed { code, output, .. } => {
            assert_eq!(code, Some(3));
            assert_eq!(output, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_commands_time_out() {
    let runner = CommandRunner::new(Duration::from_millis(100));
    let err = runner.run("sleep", &["5"]).await.unwrap_err();
    assert!(matches!(err, ActuatorError::TimedOut { .. }));
    assert!(err.to_string().contains("timed out"));
    assert!(!runner.succeeds("sleep", &["5"]).await);
}

#[tokio::test]
async fn reports_fold_failures() {
    let runner = CommandRunner::default();
    let ok = runner.report("echo", "sh", &["-c", "echo done"]).await;
    assert!(ok.ok);
    assert_eq!(ok.message, "echo ok: done");

    let failed = runner.report("false", "false", &[]).await;
    assert!(!failed.ok);
    assert!(failed.message.starts_with("false failed:"));

    let missing = runner
        .report("ghost", "fleetmend-no-such-binary", &[])
        .await;
    assert!(!missing.ok);
}

#[test]
fn path_lookup_finds_the_shell() {
    assert!(on_path("sh"));
    assert!(!on_path("fleetmend-no-such-binary"));
}
