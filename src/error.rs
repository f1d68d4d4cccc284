//! Error types for runtime provisioning.

use std::path::PathBuf;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while provisioning the fray runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Platform Errors
    // =========================================================================
    /// Host OS is not one of macOS, Linux or Windows.
    #[error("unsupported platform: operating system '{os}' is not macos, linux or windows")]
    UnsupportedPlatform { os: String },

    // =========================================================================
    // Artifact Errors
    // =========================================================================
    /// Required logical identifier missing from the resolved artifact set.
    #[error("artifact not found: {identifier}")]
    ArtifactNotFound { identifier: String },

    /// A resolved artifact file cannot be read.
    #[error("artifact {path} is unreadable: {reason}")]
    ArtifactUnreadable { path: PathBuf, reason: String },

    // =========================================================================
    // Bundle Extraction Errors
    // =========================================================================
    /// Archive cannot be opened or enumerated.
    #[error("archive {path} is unreadable: {reason}")]
    ArchiveUnreadable { path: PathBuf, reason: String },

    /// Writing an extracted entry failed.
    #[error("failed to write {path}: {reason}")]
    IoWriteFailure { path: PathBuf, reason: String },

    /// Archive entry escapes the destination directory.
    #[error("path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    /// Extracted bundle lacks the native agent library.
    #[error("invalid agent bundle at {path}: {reason}")]
    InvalidBundle { path: PathBuf, reason: String },

    /// Archive exceeds extraction limits.
    #[error("bundle exceeds limit: {size} > {limit}")]
    BundleTooLarge { size: u64, limit: u64 },

    // =========================================================================
    // External Tool Errors
    // =========================================================================
    /// External tool could not be started.
    #[error("failed to launch {tool}: {reason}")]
    ToolLaunchFailed { tool: String, reason: String },

    /// External tool exited unsuccessfully.
    #[error("{tool} failed with {}: {output}", describe_exit(.code))]
    ExternalToolFailure {
        tool: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        output: String,
    },

    /// Linked image is missing its entry point.
    #[error("invalid runtime image at {path}: {reason}")]
    InvalidRuntimeImage { path: PathBuf, reason: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// Work directory lock could not be acquired.
    #[error("failed to lock {path}: {reason}")]
    LockFailed { path: PathBuf, reason: String },

    /// Completion marker exists but cannot be parsed.
    #[error("completion marker {path} is corrupt: {reason}")]
    MarkerCorrupt { path: PathBuf, reason: String },

    // =========================================================================
    // Configuration / I/O Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}
