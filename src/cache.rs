//! # Work Directory Cache
//!
//! Both provisioned artifacts are cached under the work directory. A
//! directory counts as provisioned only when its completion marker is
//! present, matches the fingerprint of the current inputs, and the expected
//! entry point exists inside the directory.
//!
//! ## Completion Markers
//!
//! ```text
//! <work_dir>/fray-java.complete
//! {"version":1,"kind":"runtime-image","fingerprint":"9f86d0...","completed_at":1760659200}
//! ```
//!
//! Markers are written after the directory has been renamed into place, via
//! a temp file + rename, so a crash at any point leaves either no marker or
//! a complete one.
//!
//! ## Fingerprints
//!
//! A fingerprint is a SHA-256 over the marker version, the artifact kind,
//! each input file's path, length and modification time, and any extra
//! parameters (such as the extra module). Replacing an input jar therefore
//! invalidates the cache without hashing jar contents on every run.
//!
//! ## Locking
//!
//! [`WorkDirLock`] holds an exclusive advisory lock on
//! `<work_dir>/.frayprep.lock` for the whole check-build-mark sequence.
//! Concurrent provisioners on the same work directory serialize; the later
//! one finds valid markers and skips the work.

use crate::constants::{LOCK_FILE_NAME, MARKER_SUFFIX, MARKER_VERSION};
use crate::error::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

// =============================================================================
// Locking
// =============================================================================

/// Exclusive advisory lock on a work directory, released on drop.
#[derive(Debug)]
pub struct WorkDirLock {
    file: File,
    path: PathBuf,
}

impl WorkDirLock {
    /// Creates `work_dir` if needed and blocks until the lock is held.
    pub fn acquire(work_dir: &Path) -> Result<Self> {
        let path = work_dir.join(LOCK_FILE_NAME);
        let lock_failed = |e: std::io::Error| Error::LockFailed {
            path: path.clone(),
            reason: e.to_string(),
        };

        fs::create_dir_all(work_dir).map_err(lock_failed)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_failed)?;

        debug!("Waiting for lock {}", path.display());
        FileExt::lock_exclusive(&file).map_err(lock_failed)?;
        debug!("Acquired lock {}", path.display());

        Ok(Self { file, path })
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

// =============================================================================
// Fingerprints
// =============================================================================

/// Computes the cache fingerprint of an artifact's inputs.
pub fn fingerprint(kind: &str, files: &[&Path], extras: &[&str]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(MARKER_VERSION.to_le_bytes());
    hasher.update(kind.as_bytes());

    for file in files {
        let meta = fs::metadata(file).map_err(|e| Error::ArtifactUnreadable {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        hasher.update([0u8]);
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(meta.len().to_le_bytes());
        hasher.update(modified.to_le_bytes());
    }

    for extra in extras {
        hasher.update([1u8]);
        hasher.update(extra.as_bytes());
    }

    Ok(hex::encode(hasher.finalize()))
}

// =============================================================================
// Completion Markers
// =============================================================================

/// Contents of a completion marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub version: u32,
    pub kind: String,
    pub fingerprint: String,
    /// Seconds since the Unix epoch.
    pub completed_at: u64,
}

impl CompletionMarker {
    pub fn new(kind: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        let completed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: MARKER_VERSION,
            kind: kind.into(),
            fingerprint: fingerprint.into(),
            completed_at,
        }
    }
}

/// Returns the marker path for an artifact directory.
///
/// The marker is a sibling so it never becomes part of the artifact.
pub fn marker_path(artifact_dir: &Path) -> PathBuf {
    let mut name = artifact_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(MARKER_SUFFIX);
    artifact_dir.with_file_name(name)
}

/// Reads the marker for `artifact_dir`, `Ok(None)` when absent.
pub fn read_marker(artifact_dir: &Path) -> Result<Option<CompletionMarker>> {
    let path = marker_path(artifact_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Error::MarkerCorrupt {
            path,
            reason: e.to_string(),
        })
}

/// Writes the marker for `artifact_dir` atomically.
pub fn write_marker(artifact_dir: &Path, marker: &CompletionMarker) -> Result<()> {
    let path = marker_path(artifact_dir);
    let json = serde_json::to_string(marker).map_err(|e| Error::MarkerCorrupt {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::now_v7()));
    fs::write(&temp_path, json).map_err(|e| Error::IoWriteFailure {
        path: temp_path.clone(),
        reason: e.to_string(),
    })?;
    fs::rename(&temp_path, &path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::IoWriteFailure {
            path: path.clone(),
            reason: e.to_string(),
        }
    })?;

    debug!("Wrote completion marker {}", path.display());
    Ok(())
}

/// Removes the marker for `artifact_dir` if present.
pub fn remove_marker(artifact_dir: &Path) -> Result<()> {
    match fs::remove_file(marker_path(artifact_dir)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Returns true if `artifact_dir` is provisioned for `fingerprint`.
///
/// `entry_point` is a path relative to `artifact_dir` that must exist.
/// A corrupt marker counts as not provisioned.
pub fn is_complete(artifact_dir: &Path, fingerprint: &str, entry_point: &Path) -> bool {
    let marker = match read_marker(artifact_dir) {
        Ok(Some(marker)) => marker,
        Ok(None) => return false,
        Err(e) => {
            warn!("{}", e);
            return false;
        }
    };

    if marker.version != MARKER_VERSION || marker.fingerprint != fingerprint {
        debug!(
            "Marker for {} is stale (fingerprint {})",
            artifact_dir.display(),
            marker.fingerprint
        );
        return false;
    }

    if !artifact_dir.join(entry_point).exists() {
        warn!(
            "{} is marked complete but {} is missing",
            artifact_dir.display(),
            entry_point.display()
        );
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_path_is_sibling() {
        let path = marker_path(Path::new("/work/fray-java"));
        assert_eq!(path, PathBuf::from("/work/fray-java.complete"));
    }

    #[test]
    fn test_marker_roundtrip() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("fray-java");

        assert!(read_marker(&dir).unwrap().is_none());

        let marker = CompletionMarker::new("runtime-image", "abc");
        write_marker(&dir, &marker).unwrap();
        assert_eq!(read_marker(&dir).unwrap(), Some(marker));

        remove_marker(&dir).unwrap();
        assert!(read_marker(&dir).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_marker() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("fray-jvmti");
        fs::write(marker_path(&dir), "not json").unwrap();

        assert!(matches!(read_marker(&dir), Err(Error::MarkerCorrupt { .. })));
        assert!(!is_complete(&dir, "abc", Path::new("libjvmti.so")));
    }

    #[test]
    fn test_fingerprint_changes_with_input() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("jdk.jar");
        fs::write(&jar, b"v1").unwrap();

        let first = fingerprint("runtime-image", &[&jar], &["mod"]).unwrap();
        assert_eq!(first, fingerprint("runtime-image", &[&jar], &["mod"]).unwrap());
        assert_ne!(first, fingerprint("runtime-image", &[&jar], &["other"]).unwrap());

        fs::write(&jar, b"version two").unwrap();
        assert_ne!(first, fingerprint("runtime-image", &[&jar], &["mod"]).unwrap());
    }

    #[test]
    fn test_fingerprint_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.jar");
        assert!(matches!(
            fingerprint("bundle", &[&missing], &[]),
            Err(Error::ArtifactUnreadable { .. })
        ));
    }
}
