//! Tests for error types.
//!
//! Validates display formatting for each error category.

use frayprep::Error;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Platform / Artifact Error Tests
// =============================================================================

#[test]
fn test_unsupported_platform_display() {
    let err = Error::UnsupportedPlatform {
        os: "SunOS".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("SunOS"), "should include OS name");
    assert!(msg.contains("unsupported platform"));
}

#[test]
fn test_artifact_not_found_display() {
    let err = Error::ArtifactNotFound {
        identifier: "org.pastalab.fray:jdk".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("org.pastalab.fray:jdk"), "should include identifier");
    assert!(msg.contains("not found"));
}

// =============================================================================
// Extraction Error Tests
// =============================================================================

#[test]
fn test_archive_unreadable_display() {
    let err = Error::ArchiveUnreadable {
        path: PathBuf::from("/m2/jvmti.jar"),
        reason: "invalid Zip archive".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("/m2/jvmti.jar"));
    assert!(msg.contains("invalid Zip archive"));
}

#[test]
fn test_path_traversal_display() {
    let err = Error::PathTraversal {
        path: "../../etc/passwd".to_string(),
    };

    assert!(err.to_string().contains("../../etc/passwd"));
}

#[test]
fn test_bundle_too_large_display() {
    let err = Error::BundleTooLarge {
        size: 2048,
        limit: 1024,
    };
    let msg = err.to_string();

    assert!(msg.contains("2048"));
    assert!(msg.contains("1024"));
}

// =============================================================================
// External Tool Error Tests
// =============================================================================

#[test]
fn test_external_tool_failure_display() {
    let err = Error::ExternalToolFailure {
        tool: "jlink".to_string(),
        code: Some(1),
        output: "Error: cannot find module".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("jlink"));
    assert!(msg.contains("exit code 1"));
    assert!(msg.contains("cannot find module"));
}

#[test]
fn test_timeout_display() {
    let err = Error::Timeout {
        operation: "jlink".to_string(),
        duration: Duration::from_secs(600),
    };
    let msg = err.to_string();

    assert!(msg.contains("timed out"));
    assert!(msg.contains("600"));
}

// =============================================================================
// Conversion Tests
// =============================================================================

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: Error = io.into();

    assert!(matches!(err, Error::Io(_)));
    assert!(err.to_string().contains("denied"));
}
