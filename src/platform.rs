//! Platform detection.
//!
//! Native agent bundles are published per OS family and CPU architecture,
//! using the JVM's `os.name` / `os.arch` vocabulary. This module maps the
//! host onto that vocabulary.

use crate::error::{Error, Result};
use serde::Serialize;

/// Operating system family recognized by the native bundle naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Macos,
    Linux,
    Windows,
}

impl OsFamily {
    /// Classifies an OS name.
    ///
    /// Accepts Rust target names (`macos`) as well as JVM `os.name`
    /// values (`Mac OS X`, `Windows 11`). Matching is case-insensitive.
    pub fn from_os_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "mac os x" | "macos" | "darwin" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            _ if lower.starts_with("windows") => Ok(Self::Windows),
            _ => Err(Error::UnsupportedPlatform {
                os: name.to_string(),
            }),
        }
    }

    /// Returns the segment used in platform-variant identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// Returns the file name of the native agent library on this family.
    pub fn native_library_name(&self) -> &'static str {
        match self {
            Self::Macos => "libjvmti.dylib",
            Self::Linux => "libjvmti.so",
            Self::Windows => "jvmti.dll",
        }
    }

    /// Returns the path of the launcher inside a runtime image.
    pub fn java_executable(&self) -> &'static str {
        match self {
            Self::Windows => "bin/java.exe",
            _ => "bin/java",
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host platform key: raw OS name plus JVM-style architecture string.
///
/// The OS family is derived lazily so that an unrecognized OS surfaces as
/// [`Error::UnsupportedPlatform`] at the point of use rather than at
/// detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformKey {
    os_name: String,
    arch: String,
}

impl PlatformKey {
    /// Creates a key from explicit values.
    pub fn new(os_name: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os_name: os_name.into(),
            arch: arch.into(),
        }
    }

    /// Detects the host platform.
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        Self::new(os, jvm_arch(os, std::env::consts::ARCH))
    }

    /// Returns the raw OS name.
    pub fn os_name(&self) -> &str {
        &self.os_name
    }

    /// Returns the architecture string.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Returns the recognized OS family.
    pub fn os_family(&self) -> Result<OsFamily> {
        OsFamily::from_os_name(&self.os_name)
    }

    /// Returns the `<os>-<arch>` suffix of platform-variant identifiers.
    pub fn variant_suffix(&self) -> Result<String> {
        Ok(format!("{}-{}", self.os_family()?, self.arch))
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os_name, self.arch)
    }
}

/// Maps a Rust target arch onto the value the JVM reports as `os.arch`.
///
/// HotSpot reports `amd64` for x86_64 on Linux and Windows but keeps
/// `x86_64` on macOS.
pub fn jvm_arch(os: &str, rust_arch: &str) -> String {
    match (os, rust_arch) {
        ("macos", "x86_64") => "x86_64".to_string(),
        (_, "x86_64") => "amd64".to_string(),
        (_, "x86") => "x86".to_string(),
        (_, other) => other.to_string(),
    }
}
