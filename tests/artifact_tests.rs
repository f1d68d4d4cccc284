//! Tests for artifact lookup.
//!
//! Validates identifier resolution, platform-variant composition and the
//! JSON artifact table formats.

use frayprep::{ArtifactRef, ArtifactScheme, ArtifactSet, Error, PlatformKey};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn set_for(os: &str, arch: &str, ids: &[&str]) -> ArtifactSet {
    ArtifactSet::with_platform(
        ids.iter()
            .map(|id| ArtifactRef::new(*id, format!("/repo/{id}.jar"))),
        PlatformKey::new(os, arch),
    )
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_resolve_known_identifier() {
    let set = set_for("linux", "amd64", &["jdk", "agent"]);
    assert_eq!(set.resolve("agent").unwrap(), Path::new("/repo/agent.jar"));
}

#[test]
fn test_resolve_missing_identifier() {
    let set = set_for("linux", "amd64", &["agent"]);
    let err = set.resolve("jdk").unwrap_err();

    assert!(matches!(err, Error::ArtifactNotFound { ref identifier } if identifier == "jdk"));
}

// =============================================================================
// Platform Variant Tests
// =============================================================================

#[test]
fn test_platform_variant_composition() {
    let cases = [
        ("linux", "amd64", "jvmti-linux-amd64"),
        ("Linux", "aarch64", "jvmti-linux-aarch64"),
        ("Mac OS X", "aarch64", "jvmti-macos-aarch64"),
        ("macos", "x86_64", "jvmti-macos-x86_64"),
        ("Windows 11", "amd64", "jvmti-windows-amd64"),
    ];

    for (os, arch, expected) in cases {
        let set = set_for(os, arch, &[expected]);
        assert_eq!(
            set.resolve_platform_variant("jvmti").unwrap(),
            PathBuf::from(format!("/repo/{expected}.jar")),
            "{os}/{arch}"
        );
    }
}

#[test]
fn test_platform_variant_with_maven_coordinates() {
    let scheme = ArtifactScheme::maven();
    let id = "org.pastalab.fray.instrumentation:jvmti-linux-amd64";
    let set = set_for("linux", "amd64", &[id]);

    assert!(set.resolve_platform_variant(&scheme.jvmti_base).is_ok());
}

#[test]
fn test_platform_variant_missing_arch() {
    let set = set_for("linux", "riscv64", &["jvmti-linux-amd64"]);
    let err = set.resolve_platform_variant("jvmti").unwrap_err();

    assert!(
        matches!(err, Error::ArtifactNotFound { ref identifier } if identifier == "jvmti-linux-riscv64")
    );
}

#[test]
fn test_unsupported_os_fails_before_lookup() {
    // Even an entry that would match the raw OS name is never consulted.
    let set = set_for("SunOS", "sparcv9", &["jvmti-SunOS-sparcv9", "jvmti-sunos-sparcv9"]);
    let err = set.resolve_platform_variant("jvmti").unwrap_err();

    assert!(matches!(err, Error::UnsupportedPlatform { ref os } if os == "SunOS"));
}

// =============================================================================
// Module Path Tests
// =============================================================================

#[test]
fn test_module_path_keeps_order_and_excludes_agent() {
    let set = set_for("linux", "amd64", &["jdk", "agent", "asm", "jvmti-linux-amd64"]);

    assert_eq!(
        set.module_path("agent"),
        vec![
            PathBuf::from("/repo/jdk.jar"),
            PathBuf::from("/repo/asm.jar"),
            PathBuf::from("/repo/jvmti-linux-amd64.jar"),
        ]
    );
}

// =============================================================================
// Artifact Table Tests
// =============================================================================

#[test]
fn test_from_json_file_map_form() {
    let temp = TempDir::new().unwrap();
    let table = temp.path().join("artifacts.json");
    std::fs::write(
        &table,
        r#"{"org.pastalab.fray:jdk": "/m2/jdk.jar", "org.pastalab.fray.instrumentation:agent": "/m2/agent.jar"}"#,
    )
    .unwrap();

    let set = ArtifactSet::from_json_file(&table, PlatformKey::new("linux", "amd64")).unwrap();

    assert_eq!(set.artifacts().len(), 2);
    assert_eq!(
        set.resolve(&ArtifactScheme::maven().jdk).unwrap(),
        Path::new("/m2/jdk.jar")
    );
}

#[test]
fn test_from_json_file_missing() {
    let temp = TempDir::new().unwrap();
    let result =
        ArtifactSet::from_json_file(&temp.path().join("nope.json"), PlatformKey::new("linux", "amd64"));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_from_json_invalid() {
    let result = ArtifactSet::from_json_str("[1, 2, 3]", PlatformKey::new("linux", "amd64"));
    assert!(matches!(result, Err(Error::Config(_))));
}
