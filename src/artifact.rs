//! Artifact lookup.
//!
//! The host build tool resolves fray's dependencies and hands over a table
//! of logical identifiers to local files. [`ArtifactSet`] is a read-only view
//! of that table; it never resolves anything itself.
//!
//! ## Identifier Schemes
//!
//! Two naming conventions are in use. The Maven plugin sees full
//! coordinates (`org.pastalab.fray:jdk`), other hosts pass bare names
//! (`jdk`). [`ArtifactScheme`] captures the convention so the provisioning
//! workflow is written once.

use crate::constants::{
    MAVEN_AGENT_ID, MAVEN_JDK_ID, MAVEN_JVMTI_BASE, SHORT_AGENT_ID, SHORT_JDK_ID,
    SHORT_JVMTI_BASE,
};
use crate::error::{Error, Result};
use crate::platform::PlatformKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// A resolved artifact: logical identifier plus local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub identifier: String,
    pub file: PathBuf,
}

impl ArtifactRef {
    pub fn new(identifier: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            file: file.into(),
        }
    }
}

/// Identifier convention for the three artifacts the workflow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactScheme {
    /// Instrumented JDK jar, applied as the link-time agent.
    pub jdk: String,
    /// Instrumentation agent jar, attached to the test JVM.
    pub agent: String,
    /// Base of the platform-variant native bundle identifiers.
    pub jvmti_base: String,
}

impl ArtifactScheme {
    /// Full Maven coordinates.
    pub fn maven() -> Self {
        Self {
            jdk: MAVEN_JDK_ID.to_string(),
            agent: MAVEN_AGENT_ID.to_string(),
            jvmti_base: MAVEN_JVMTI_BASE.to_string(),
        }
    }

    /// Bare artifact names.
    pub fn short() -> Self {
        Self {
            jdk: SHORT_JDK_ID.to_string(),
            agent: SHORT_AGENT_ID.to_string(),
            jvmti_base: SHORT_JVMTI_BASE.to_string(),
        }
    }
}

impl Default for ArtifactScheme {
    fn default() -> Self {
        Self::maven()
    }
}

impl FromStr for ArtifactScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maven" => Ok(Self::maven()),
            "short" => Ok(Self::short()),
            other => Err(Error::Config(format!(
                "unknown artifact scheme '{other}' (expected 'maven' or 'short')"
            ))),
        }
    }
}

/// On-disk forms of an artifact table.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactTable {
    Map(BTreeMap<String, PathBuf>),
    List(Vec<ArtifactRef>),
}

/// Read-only set of resolved artifacts with platform-aware lookup.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    artifacts: Vec<ArtifactRef>,
    platform: PlatformKey,
}

impl ArtifactSet {
    /// Creates a set for the detected host platform.
    pub fn new(artifacts: impl IntoIterator<Item = ArtifactRef>) -> Self {
        Self::with_platform(artifacts, PlatformKey::detect())
    }

    /// Creates a set for an explicit platform.
    pub fn with_platform(
        artifacts: impl IntoIterator<Item = ArtifactRef>,
        platform: PlatformKey,
    ) -> Self {
        let mut unique: Vec<ArtifactRef> = Vec::new();
        for artifact in artifacts {
            if unique.iter().any(|a| a.identifier == artifact.identifier) {
                warn!(
                    "Duplicate artifact identifier '{}', keeping first entry",
                    artifact.identifier
                );
                continue;
            }
            unique.push(artifact);
        }
        Self {
            artifacts: unique,
            platform,
        }
    }

    /// Loads a JSON artifact table.
    ///
    /// Accepts either `{"id": "path", ...}` or
    /// `[{"identifier": "id", "file": "path"}, ...]`.
    pub fn from_json_file(path: &Path, platform: PlatformKey) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read artifact table {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text, platform)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parses a JSON artifact table.
    pub fn from_json_str(text: &str, platform: PlatformKey) -> Result<Self> {
        let table: ArtifactTable = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid artifact table: {e}")))?;
        let artifacts = match table {
            ArtifactTable::Map(map) => map
                .into_iter()
                .map(|(identifier, file)| ArtifactRef { identifier, file })
                .collect(),
            ArtifactTable::List(list) => list,
        };
        Ok(Self::with_platform(artifacts, platform))
    }

    /// Returns the platform used for variant lookups.
    pub fn platform(&self) -> &PlatformKey {
        &self.platform
    }

    /// Returns all artifacts in registration order.
    pub fn artifacts(&self) -> &[ArtifactRef] {
        &self.artifacts
    }

    /// Returns the file registered under `identifier`.
    pub fn resolve(&self, identifier: &str) -> Result<&Path> {
        self.artifacts
            .iter()
            .find(|a| a.identifier == identifier)
            .map(|a| a.file.as_path())
            .ok_or_else(|| Error::ArtifactNotFound {
                identifier: identifier.to_string(),
            })
    }

    /// Returns the file for `<base>-<os family>-<arch>`.
    ///
    /// Fails with [`Error::UnsupportedPlatform`] before any lookup when the
    /// host OS is not recognized.
    pub fn resolve_platform_variant(&self, base: &str) -> Result<&Path> {
        let identifier = format!("{base}-{}", self.platform.variant_suffix()?);
        debug!("Resolving platform variant: {}", identifier);
        self.resolve(&identifier)
    }

    /// Returns every artifact file except the one registered as `excluded`.
    pub fn module_path(&self, excluded: &str) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .filter(|a| a.identifier != excluded)
            .map(|a| a.file.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> PlatformKey {
        PlatformKey::new("linux", "amd64")
    }

    #[test]
    fn test_duplicate_identifier_keeps_first() {
        let set = ArtifactSet::with_platform(
            vec![ArtifactRef::new("jdk", "/a.jar"), ArtifactRef::new("jdk", "/b.jar")],
            linux(),
        );
        assert_eq!(set.artifacts().len(), 1);
        assert_eq!(set.resolve("jdk").unwrap(), Path::new("/a.jar"));
    }

    #[test]
    fn test_module_path_excludes_agent() {
        let set = ArtifactSet::with_platform(
            vec![
                ArtifactRef::new("jdk", "/jdk.jar"),
                ArtifactRef::new("agent", "/agent.jar"),
                ArtifactRef::new("asm", "/asm.jar"),
            ],
            linux(),
        );
        assert_eq!(
            set.module_path("agent"),
            vec![PathBuf::from("/jdk.jar"), PathBuf::from("/asm.jar")]
        );
    }

    #[test]
    fn test_json_list_form() {
        let json = r#"[{"identifier": "jdk", "file": "/jdk.jar"}]"#;
        let set = ArtifactSet::from_json_str(json, linux()).unwrap();
        assert_eq!(set.resolve("jdk").unwrap(), Path::new("/jdk.jar"));
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("maven".parse::<ArtifactScheme>().unwrap(), ArtifactScheme::maven());
        assert_eq!("Short".parse::<ArtifactScheme>().unwrap(), ArtifactScheme::short());
        assert!("gradle".parse::<ArtifactScheme>().is_err());
    }
}
