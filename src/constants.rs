//! # Provisioning Constants
//!
//! Directory names, artifact identifiers, file names and extraction limits
//! used throughout the crate. These constants are the **single source of
//! truth** for the on-disk layout under a work directory:
//!
//! ```text
//! <work_dir>/
//! ├── .frayprep.lock            (advisory lock, held while provisioning)
//! ├── fray-java/                (linked runtime image)
//! ├── fray-java.complete        (completion marker, JSON)
//! ├── fray-jvmti/               (native agent bundle)
//! ├── fray-jvmti.complete       (completion marker, JSON)
//! └── fray-report/              (fray report directory, created by the JVM)
//! ```
//!
//! ## Cross-References
//!
//! - [`crate::artifact`]: Uses the artifact identifiers
//! - [`crate::bundle`]: Uses the extraction limits
//! - [`crate::cache`]: Uses the lock and marker names
//! - [`crate::provision`]: Uses the directory names

// =============================================================================
// Work Directory Layout
// =============================================================================

/// Default work directory, relative to the project root.
///
/// Mirrors a Maven `${project.build.directory}/fray`.
pub const DEFAULT_WORK_DIR: &str = "target/fray";

/// Subdirectory holding the linked runtime image.
pub const RUNTIME_DIR_NAME: &str = "fray-java";

/// Subdirectory holding the extracted native agent bundle.
pub const AGENT_BUNDLE_DIR_NAME: &str = "fray-jvmti";

/// Subdirectory handed to the JVM as the fray report directory.
pub const REPORT_DIR_NAME: &str = "fray-report";

/// Advisory lock file serializing provisioners on one work directory.
pub const LOCK_FILE_NAME: &str = ".frayprep.lock";

/// Suffix appended to an artifact directory name to form its marker file.
pub const MARKER_SUFFIX: &str = ".complete";

/// Marker format version. Bumping it invalidates every existing cache.
pub const MARKER_VERSION: u32 = 1;

// =============================================================================
// Artifact Identifiers
// =============================================================================
//
// Identifiers are opaque `group:name` keys supplied by the host's dependency
// resolution. The Maven scheme uses full coordinates; the short scheme uses
// bare names.
// =============================================================================

/// Maven coordinate of the instrumented JDK jar.
pub const MAVEN_JDK_ID: &str = "org.pastalab.fray:jdk";

/// Maven coordinate of the instrumentation agent jar.
pub const MAVEN_AGENT_ID: &str = "org.pastalab.fray.instrumentation:agent";

/// Maven coordinate prefix of the platform-specific native bundles.
pub const MAVEN_JVMTI_BASE: &str = "org.pastalab.fray.instrumentation:jvmti";

/// Short identifier of the instrumented JDK jar.
pub const SHORT_JDK_ID: &str = "jdk";

/// Short identifier of the instrumentation agent jar.
pub const SHORT_AGENT_ID: &str = "agent";

/// Short identifier prefix of the platform-specific native bundles.
pub const SHORT_JVMTI_BASE: &str = "jvmti";

/// Module added to the link step so the JDK instrumentation is resolvable.
pub const INSTRUMENTATION_MODULE: &str = "org.pastalab.fray.instrumentation.jdk";

// =============================================================================
// External Tool
// =============================================================================

/// Default link-time tool, looked up on `PATH`.
pub const DEFAULT_JLINK: &str = "jlink";

/// jlink plugin flag enabling the fray instrumentation extension.
pub const FRAY_INSTRUMENTATION_FLAG: &str = "--fray-instrumentation";

/// System property naming the fray report directory.
pub const REPORT_DIR_PROPERTY: &str = "fray.workDir";

/// Host property accumulating test-runner JVM arguments.
pub const ARG_LINE_PROPERTY: &str = "argLine";

/// Host property naming the JVM executable used to fork tests.
pub const JVM_PROPERTY: &str = "jvm";

// =============================================================================
// Extraction Limits
// =============================================================================

/// Maximum number of entries in a native agent bundle.
///
/// **Rationale**: Real bundles hold a shared library and a handful of
/// companion files. 10,000 entries bounds inode usage from a malformed
/// archive.
pub const MAX_BUNDLE_ENTRIES: usize = 10_000;

/// Maximum total extracted size of a native agent bundle (1 GiB).
///
/// **Attack Vector**: Compression bombs (small compressed, huge uncompressed).
pub const MAX_BUNDLE_SIZE: u64 = 1024 * 1024 * 1024;
