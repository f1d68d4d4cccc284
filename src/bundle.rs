//! Native agent bundle extraction.
//!
//! The JVMTI agent ships as a jar whose entries are the shared library and
//! its companion files. Extraction copies every entry verbatim under a
//! destination directory, creating directories on demand so entry order
//! does not matter.
//!
//! ## Security
//!
//! - Entry names with `..` components or absolute paths are rejected with
//!   [`Error::PathTraversal`] before anything is written for them.
//! - Entry count and total extracted bytes are bounded by
//!   [`MAX_BUNDLE_ENTRIES`] and [`MAX_BUNDLE_SIZE`]; the byte bound is
//!   enforced on the decompressed stream, not the declared size.
//!
//! A failed extraction may leave `dest_dir` partially populated. Callers
//! extract into a staging directory and discard it on error (see
//! [`crate::provision`]).

use crate::constants::{MAX_BUNDLE_ENTRIES, MAX_BUNDLE_SIZE};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Extracts every entry of `archive` into `dest_dir`.
///
/// `dest_dir` need not exist. Directory entries become directories, file
/// entries are copied byte for byte to `dest_dir/<entry name>`.
pub fn extract(archive: &Path, dest_dir: &Path) -> Result<()> {
    extract_with_limits(archive, dest_dir, MAX_BUNDLE_ENTRIES, MAX_BUNDLE_SIZE)
}

fn extract_with_limits(
    archive: &Path,
    dest_dir: &Path,
    max_entries: usize,
    max_size: u64,
) -> Result<()> {
    let unreadable = |reason: String| Error::ArchiveUnreadable {
        path: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(|e| unreadable(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;

    if zip.len() > max_entries {
        return Err(Error::BundleTooLarge {
            size: zip.len() as u64,
            limit: max_entries as u64,
        });
    }

    create_dir(dest_dir)?;

    let mut total_size = 0u64;
    let mut files = 0usize;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| unreadable(e.to_string()))?;
        let relative = entry_path(entry.name())?;
        let target = dest_dir.join(&relative);

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let remaining = max_size - total_size;
        let mut out = File::create(&target).map_err(|e| write_failure(&target, e))?;
        // Read one byte past the budget so overflow is detectable.
        let written = io::copy(&mut (&mut entry).take(remaining + 1), &mut out)
            .map_err(|e| write_failure(&target, e))?;

        total_size += written;
        if total_size > max_size {
            return Err(Error::BundleTooLarge {
                size: total_size,
                limit: max_size,
            });
        }

        debug!("Extracted {} ({} bytes)", relative.display(), written);
        files += 1;
    }

    info!(
        "Extracted {} files ({} bytes) from {} into {}",
        files,
        total_size,
        archive.display(),
        dest_dir.display()
    );
    Ok(())
}

/// Validates an archive entry name and returns it as a relative path.
fn entry_path(name: &str) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        path: name.to_string(),
    };

    // SECURITY: Reject absolute paths (including Windows drive prefixes) and
    // parent components before joining onto the destination.
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(traversal());
    }

    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    Ok(relative)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| write_failure(path, e))
}

fn write_failure(path: &Path, e: io::Error) -> Error {
    Error::IoWriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_size_budget_across_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.jar");
        write_zip(&archive, &[("a.bin", &[1u8; 6][..]), ("b.bin", &[2u8; 5][..])]);

        let err = extract_with_limits(&archive, &temp.path().join("out"), 10, 10).unwrap_err();
        assert!(matches!(err, Error::BundleTooLarge { size: 11, limit: 10 }));
    }

    #[test]
    fn test_size_budget_exact_fit() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.jar");
        write_zip(&archive, &[("a.bin", &[1u8; 6][..]), ("b.bin", &[2u8; 4][..])]);

        let dest = temp.path().join("out");
        extract_with_limits(&archive, &dest, 10, 10).unwrap();
        assert_eq!(fs::read(dest.join("b.bin")).unwrap(), [2u8; 4]);
    }

    #[test]
    fn test_entry_limit() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.jar");
        write_zip(&archive, &[("a", &b"a"[..]), ("b", &b"b"[..]), ("c", &b"c"[..])]);

        let dest = temp.path().join("out");
        let err = extract_with_limits(&archive, &dest, 2, MAX_BUNDLE_SIZE).unwrap_err();
        assert!(matches!(err, Error::BundleTooLarge { size: 3, limit: 2 }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_entry_path_normal() {
        assert_eq!(entry_path("a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
        assert_eq!(entry_path("./c.txt").unwrap(), PathBuf::from("c.txt"));
        assert_eq!(entry_path("META-INF/").unwrap(), PathBuf::from("META-INF"));
    }

    #[test]
    fn test_entry_path_rejects_traversal() {
        assert!(matches!(entry_path("../evil"), Err(Error::PathTraversal { .. })));
        assert!(matches!(entry_path("a/../../evil"), Err(Error::PathTraversal { .. })));
        assert!(matches!(entry_path("/etc/passwd"), Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn test_entry_path_allows_dots_in_names() {
        assert_eq!(entry_path("lib..so").unwrap(), PathBuf::from("lib..so"));
    }
}
