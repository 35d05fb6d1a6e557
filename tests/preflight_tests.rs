//! Tests for the install-and-recheck path of the tool version preflight.

use assert_matches::assert_matches;
use license_manifest::{AggregationError, CommandSpec, ToolPreflight};
use std::fs;
use tempfile::tempdir;

#[tokio::test]
async fn installer_runs_once_and_recheck_passes() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("version.txt"), "license-scan 1.0\n").expect("seed version");

    // The probe reads a state file the installer rewrites, standing in for a
    // real tool that reports a new version after an upgrade.
    let preflight = ToolPreflight {
        program: "sh".to_string(),
        version_args: vec!["-c".to_string(), "cat version.txt".to_string()],
        expected: "license-scan 2.1".to_string(),
        install: Some(CommandSpec::new(
            "sh",
            ["-c", "echo 'license-scan 2.1' > version.txt"],
        )),
    };

    preflight
        .ensure(dir.path(), None)
        .await
        .expect("install path recovers the pinned version");
    assert_eq!(
        fs::read_to_string(dir.path().join("version.txt")).expect("read state"),
        "license-scan 2.1\n"
    );
}

#[tokio::test]
async fn ineffective_installer_still_reports_mismatch() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("version.txt"), "license-scan 1.0\n").expect("seed version");

    let preflight = ToolPreflight {
        program: "sh".to_string(),
        version_args: vec!["-c".to_string(), "cat version.txt".to_string()],
        expected: "license-scan 2.1".to_string(),
        install: Some(CommandSpec::new("true", Vec::<String>::new())),
    };

    let err = preflight.ensure(dir.path(), None).await.unwrap_err();
    assert_matches!(
        err,
        AggregationError::VersionMismatch { found, .. } if found == "license-scan 1.0"
    );
}

#[tokio::test]
async fn failing_installer_is_fatal() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("version.txt"), "license-scan 1.0\n").expect("seed version");

    let preflight = ToolPreflight {
        program: "sh".to_string(),
        version_args: vec!["-c".to_string(), "cat version.txt".to_string()],
        expected: "license-scan 2.1".to_string(),
        install: Some(CommandSpec::new(
            "sh",
            ["-c", "echo 'registry unreachable' >&2; exit 1"],
        )),
    };

    let err = preflight.ensure(dir.path(), None).await.unwrap_err();
    match err {
        AggregationError::ExternalToolFailure { reason, .. } => {
            assert!(reason.to_string().contains("registry unreachable"));
        }
        other => panic!("expected external tool failure, got {other:?}"),
    }
}
