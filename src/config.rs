//! Provisioning configuration.
//!
//! Values come from builder-style setters, or from the environment via
//! [`ProvisionConfig::from_env`]:
//!
//! | Variable                  | Meaning                                  |
//! |---------------------------|------------------------------------------|
//! | `FRAY_WORK_DIR`           | Work directory (default `target/fray`)   |
//! | `FRAY_JLINK`              | jlink executable                         |
//! | `JAVA_HOME`               | Fallback: `$JAVA_HOME/bin/jlink`         |
//! | `FRAY_ARTIFACT_SCHEME`    | `maven` (default) or `short`             |
//! | `FRAY_JLINK_TIMEOUT_SECS` | Kill jlink after this many seconds       |
//! | `FRAY_REPORT_PROPERTY`    | Add `-Dfray.workDir` to the arg line     |

use crate::artifact::ArtifactScheme;
use crate::constants::{DEFAULT_JLINK, DEFAULT_WORK_DIR, INSTRUMENTATION_MODULE};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub work_dir: PathBuf,
    pub scheme: ArtifactScheme,
    pub jlink: PathBuf,
    /// Module added to the link-time JVM.
    pub extra_module: String,
    /// `None` waits for jlink indefinitely.
    pub jlink_timeout: Option<Duration>,
    /// Whether the launch arguments carry `-Dfray.workDir`.
    pub report_property: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            scheme: ArtifactScheme::default(),
            jlink: PathBuf::from(DEFAULT_JLINK),
            extra_module: INSTRUMENTATION_MODULE.to_string(),
            jlink_timeout: None,
            report_property: true,
        }
    }
}

impl ProvisionConfig {
    /// Creates a configuration for `work_dir` with defaults elsewhere.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("FRAY_WORK_DIR") {
            config.work_dir = PathBuf::from(dir);
        }

        if let Some(jlink) = var("FRAY_JLINK") {
            config.jlink = PathBuf::from(jlink);
        } else if let Some(home) = var("JAVA_HOME") {
            config.jlink = jlink_in(Path::new(&home));
        }

        if let Some(scheme) = var("FRAY_ARTIFACT_SCHEME") {
            config.scheme = scheme.parse()?;
        }

        if let Some(secs) = var("FRAY_JLINK_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("FRAY_JLINK_TIMEOUT_SECS must be an integer, got '{secs}'"))
            })?;
            config.jlink_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(flag) = var("FRAY_REPORT_PROPERTY") {
            config.report_property = parse_bool(&flag).ok_or_else(|| {
                Error::Config(format!("FRAY_REPORT_PROPERTY must be true or false, got '{flag}'"))
            })?;
        }

        Ok(config)
    }

    pub fn with_scheme(mut self, scheme: ArtifactScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_jlink(mut self, jlink: impl Into<PathBuf>) -> Self {
        self.jlink = jlink.into();
        self
    }

    pub fn with_jlink_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.jlink_timeout = timeout;
        self
    }

    pub fn with_report_property(mut self, enabled: bool) -> Self {
        self.report_property = enabled;
        self
    }
}

/// Returns the jlink launcher inside a JDK home.
pub fn jlink_in(java_home: &Path) -> PathBuf {
    let name = if cfg!(windows) { "jlink.exe" } else { "jlink" };
    java_home.join("bin").join(name)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
