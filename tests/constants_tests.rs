//! Tests for provisioning constants.
//!
//! Pins the on-disk layout and identifiers that build-tool integrations
//! depend on.

use frayprep::constants::*;

#[test]
fn test_work_dir_layout_names() {
    assert_eq!(RUNTIME_DIR_NAME, "fray-java");
    assert_eq!(AGENT_BUNDLE_DIR_NAME, "fray-jvmti");
    assert_eq!(REPORT_DIR_NAME, "fray-report");
    assert_eq!(DEFAULT_WORK_DIR, "target/fray");
}

#[test]
fn test_layout_names_are_distinct() {
    let names = [
        RUNTIME_DIR_NAME,
        AGENT_BUNDLE_DIR_NAME,
        REPORT_DIR_NAME,
        LOCK_FILE_NAME,
    ];
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_maven_identifiers() {
    assert_eq!(MAVEN_JDK_ID, "org.pastalab.fray:jdk");
    assert_eq!(MAVEN_AGENT_ID, "org.pastalab.fray.instrumentation:agent");
    assert!(MAVEN_JVMTI_BASE.starts_with("org.pastalab.fray.instrumentation:"));
}

#[test]
fn test_host_properties() {
    assert_eq!(ARG_LINE_PROPERTY, "argLine");
    assert_eq!(JVM_PROPERTY, "jvm");
    assert_eq!(REPORT_DIR_PROPERTY, "fray.workDir");
}

#[test]
fn test_extraction_limits_sane() {
    assert!(MAX_BUNDLE_ENTRIES >= 100);
    assert!(MAX_BUNDLE_SIZE >= 64 * 1024 * 1024);
}
