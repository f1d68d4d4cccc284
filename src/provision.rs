//! # Provisioning Workflow
//!
//! [`Provisioner::provision`] makes sure the work directory holds a linked,
//! instrumented runtime image and the native agent bundle for this
//! platform, then returns the [`LaunchConfig`] a test JVM needs:
//!
//! ```text
//!   resolve artifacts ──► lock work dir ──► runtime image ──► agent bundle ──► LaunchConfig
//!   (no I/O writes)        (.frayprep.lock)   cached | jlink    cached | unzip
//! ```
//!
//! ## Idempotence
//!
//! Each artifact directory is built in a staging directory next to it,
//! renamed into place, and only then marked complete (see [`crate::cache`]).
//! A later run skips any directory whose marker matches the current input
//! fingerprint and whose entry point exists. Directories without a valid
//! marker are deleted and rebuilt; failed builds remove their staging
//! directory, so the target is never left half-populated. Staging
//! directories abandoned by a killed process are removed by the next run
//! that takes the lock, and by [`Provisioner::clean`].
//!
//! ## Failure Before Writes
//!
//! Platform classification and every artifact lookup happen before the work
//! directory is touched. A missing artifact or unsupported OS fails with no
//! filesystem changes.

use crate::artifact::ArtifactSet;
use crate::bundle;
use crate::cache::{self, CompletionMarker, WorkDirLock};
use crate::config::ProvisionConfig;
use crate::constants::{
    AGENT_BUNDLE_DIR_NAME, ARG_LINE_PROPERTY, JVM_PROPERTY, REPORT_DIR_NAME,
    REPORT_DIR_PROPERTY, RUNTIME_DIR_NAME,
};
use crate::error::{Error, Result};
use crate::jlink::{JlinkRequest, RuntimeImageBuilder, SystemToolRunner, ToolRunner};
use crate::platform::OsFamily;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const RUNTIME_KIND: &str = "runtime-image";
const BUNDLE_KIND: &str = "agent-bundle";

// =============================================================================
// Launch Configuration
// =============================================================================

/// Paths a test JVM needs to run under fray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    /// Instrumentation agent, passed as `-javaagent`.
    pub agent_jar_path: PathBuf,
    /// Native agent library, passed as `-agentpath`.
    pub native_agent_library_path: PathBuf,
    /// Root of the linked runtime image.
    pub runtime_work_dir: PathBuf,
    /// Launcher inside the runtime image.
    pub jvm_executable_path: PathBuf,
    /// fray report directory, passed as `-Dfray.workDir` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

impl LaunchConfig {
    /// Returns the JVM arguments that attach both agents.
    pub fn agent_arguments(&self) -> String {
        let mut args = format!(
            "-javaagent:{} -agentpath:{}",
            self.agent_jar_path.display(),
            self.native_agent_library_path.display()
        );
        if let Some(report_dir) = &self.report_dir {
            args.push_str(&format!(" -D{}={}", REPORT_DIR_PROPERTY, report_dir.display()));
        }
        args
    }

    /// Appends the agent arguments to an accumulated test-runner arg line.
    pub fn append_to_arg_line(&self, existing: Option<&str>) -> String {
        format!("{} {}", existing.unwrap_or(""), self.agent_arguments())
    }

    /// Returns the host properties to set: `argLine` and `jvm`.
    pub fn to_properties(&self, existing_arg_line: Option<&str>) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                ARG_LINE_PROPERTY.to_string(),
                self.append_to_arg_line(existing_arg_line),
            ),
            (
                JVM_PROPERTY.to_string(),
                self.jvm_executable_path.display().to_string(),
            ),
        ])
    }

    /// Renders [`LaunchConfig::to_properties`] in `java.util.Properties`
    /// text format, one escaped `key=value` line each.
    pub fn to_properties_text(&self, existing_arg_line: Option<&str>) -> String {
        self.to_properties(existing_arg_line)
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}\n",
                    escape_property(key, true),
                    escape_property(value, false)
                )
            })
            .collect()
    }
}

/// Escapes `text` so `Properties.load` reads it back unchanged.
///
/// Keys additionally escape separators and comment characters; values only
/// escape a leading space, which the loader would otherwise strip.
fn escape_property(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Whether a provisioning step did work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// Built or extracted during this run.
    Built,
    /// Valid cached copy reused.
    Cached,
}

/// Result of [`Provisioner::provision_detailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioned {
    pub launch: LaunchConfig,
    pub runtime: StepOutcome,
    pub agent_bundle: StepOutcome,
}

// =============================================================================
// Provisioner
// =============================================================================

/// Everything resolved before touching the filesystem.
struct Plan {
    os: OsFamily,
    work_dir: PathBuf,
    jdk_jar: PathBuf,
    agent_jar: PathBuf,
    bundle_archive: PathBuf,
    module_path: Vec<PathBuf>,
    runtime_fingerprint: String,
    bundle_fingerprint: String,
}

/// Idempotent provisioner for one work directory.
///
/// Safe to run from several processes at once against the same work
/// directory; they serialize on the work directory lock.
pub struct Provisioner {
    config: ProvisionConfig,
    artifacts: ArtifactSet,
    runner: Arc<dyn ToolRunner>,
}

impl Provisioner {
    /// Creates a provisioner that runs jlink as a child process.
    pub fn new(config: ProvisionConfig, artifacts: ArtifactSet) -> Self {
        let runner = Arc::new(SystemToolRunner::with_timeout(config.jlink_timeout));
        Self::with_runner(config, artifacts, runner)
    }

    /// Creates a provisioner with a custom tool runner.
    pub fn with_runner(
        config: ProvisionConfig,
        artifacts: ArtifactSet,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            config,
            artifacts,
            runner,
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Returns the runtime image directory.
    pub fn runtime_dir(&self) -> PathBuf {
        self.config.work_dir.join(RUNTIME_DIR_NAME)
    }

    /// Returns the native agent bundle directory.
    pub fn agent_bundle_dir(&self) -> PathBuf {
        self.config.work_dir.join(AGENT_BUNDLE_DIR_NAME)
    }

    /// Provisions both artifacts and returns the launch configuration.
    pub fn provision(&self) -> Result<LaunchConfig> {
        self.provision_detailed().map(|p| p.launch)
    }

    /// Like [`Provisioner::provision`], also reporting what was rebuilt.
    pub fn provision_detailed(&self) -> Result<Provisioned> {
        let plan = self.plan()?;
        let runtime_dir = plan.work_dir.join(RUNTIME_DIR_NAME);
        let bundle_dir = plan.work_dir.join(AGENT_BUNDLE_DIR_NAME);

        let _lock = WorkDirLock::acquire(&plan.work_dir)?;

        let runtime = self.ensure(
            &plan.work_dir,
            &runtime_dir,
            RUNTIME_KIND,
            &plan.runtime_fingerprint,
            Path::new(plan.os.java_executable()),
            |staging| {
                let request = JlinkRequest {
                    module_path: plan.module_path.clone(),
                    instrumentation_agent_jar: plan.jdk_jar.clone(),
                    output_dir: staging.to_path_buf(),
                    extra_module: self.config.extra_module.clone(),
                };
                RuntimeImageBuilder::new(&self.config.jlink, self.runner.as_ref(), plan.os)
                    .build(&request)
                    .map(|_| ())
            },
        )?;

        let library_name = plan.os.native_library_name();
        let agent_bundle = self.ensure(
            &plan.work_dir,
            &bundle_dir,
            BUNDLE_KIND,
            &plan.bundle_fingerprint,
            Path::new(library_name),
            |staging| {
                bundle::extract(&plan.bundle_archive, staging)?;
                if !staging.join(library_name).is_file() {
                    return Err(Error::InvalidBundle {
                        path: plan.bundle_archive.clone(),
                        reason: format!("missing {library_name} at bundle root"),
                    });
                }
                Ok(())
            },
        )?;

        let launch = LaunchConfig {
            agent_jar_path: plan.agent_jar.clone(),
            native_agent_library_path: bundle_dir.join(library_name),
            jvm_executable_path: runtime_dir.join(plan.os.java_executable()),
            runtime_work_dir: runtime_dir,
            report_dir: self
                .config
                .report_property
                .then(|| plan.work_dir.join(REPORT_DIR_NAME)),
        };

        info!(
            "fray runtime ready: jvm={} agent={}",
            launch.jvm_executable_path.display(),
            launch.native_agent_library_path.display()
        );

        Ok(Provisioned {
            launch,
            runtime,
            agent_bundle,
        })
    }

    /// Deletes both artifact directories and their markers.
    pub fn clean(&self) -> Result<()> {
        let work_dir = std::path::absolute(&self.config.work_dir)?;
        if !work_dir.exists() {
            return Ok(());
        }

        let _lock = WorkDirLock::acquire(&work_dir)?;
        for dir in [
            work_dir.join(RUNTIME_DIR_NAME),
            work_dir.join(AGENT_BUNDLE_DIR_NAME),
        ] {
            reap_staging(&work_dir, &dir)?;
            cache::remove_marker(&dir)?;
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                info!("Removed {}", dir.display());
            }
        }
        Ok(())
    }

    /// Resolves every input without writing anything.
    fn plan(&self) -> Result<Plan> {
        let os = self.artifacts.platform().os_family()?;
        let scheme = &self.config.scheme;

        let jdk_jar = self.artifacts.resolve(&scheme.jdk)?.to_path_buf();
        let agent_jar = self.artifacts.resolve(&scheme.agent)?.to_path_buf();
        let bundle_archive = self
            .artifacts
            .resolve_platform_variant(&scheme.jvmti_base)?
            .to_path_buf();
        let module_path = self.artifacts.module_path(&scheme.agent);

        let work_dir = std::path::absolute(&self.config.work_dir)?;

        // The agent jar is not a build input, only check that it exists.
        if let Err(e) = fs::metadata(&agent_jar) {
            return Err(Error::ArtifactUnreadable {
                path: agent_jar,
                reason: e.to_string(),
            });
        }

        // jlink links every module path entry (ALL-MODULE-PATH), the platform
        // bundle jar included, so each one is an input of the image.
        let mut runtime_inputs: Vec<&Path> = vec![jdk_jar.as_path()];
        runtime_inputs.extend(module_path.iter().map(PathBuf::as_path));
        let jlink = self.config.jlink.to_string_lossy();
        let runtime_fingerprint = cache::fingerprint(
            RUNTIME_KIND,
            &runtime_inputs,
            &[self.config.extra_module.as_str(), jlink.as_ref()],
        )?;
        let bundle_fingerprint = cache::fingerprint(BUNDLE_KIND, &[bundle_archive.as_path()], &[])?;

        debug!(
            "Provisioning plan for {}: jdk={} bundle={} ({} module path entries)",
            work_dir.display(),
            jdk_jar.display(),
            bundle_archive.display(),
            module_path.len()
        );

        Ok(Plan {
            os,
            work_dir,
            jdk_jar,
            agent_jar,
            bundle_archive,
            module_path,
            runtime_fingerprint,
            bundle_fingerprint,
        })
    }

    /// Makes `target` a complete artifact directory for `fingerprint`.
    ///
    /// Must be called with the work directory lock held.
    fn ensure(
        &self,
        work_dir: &Path,
        target: &Path,
        kind: &str,
        fingerprint: &str,
        entry_point: &Path,
        populate: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<StepOutcome> {
        reap_staging(work_dir, target)?;

        if cache::is_complete(target, fingerprint, entry_point) {
            debug!("{} already provisioned at {}", kind, target.display());
            return Ok(StepOutcome::Cached);
        }

        cache::remove_marker(target)?;
        if target.exists() {
            warn!("Removing stale {} at {}", kind, target.display());
            fs::remove_dir_all(target)?;
        }

        let staging = work_dir.join(format!("{}{}", staging_prefix(target), uuid::Uuid::now_v7()));

        info!("Provisioning {} at {}", kind, target.display());
        if let Err(e) = populate(&staging) {
            discard(&staging);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, target) {
            discard(&staging);
            return Err(Error::IoWriteFailure {
                path: target.to_path_buf(),
                reason: e.to_string(),
            });
        }

        cache::write_marker(target, &CompletionMarker::new(kind, fingerprint))?;
        Ok(StepOutcome::Built)
    }
}

/// Name prefix of staging directories for `target`: `.<name>.staging-`.
fn staging_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{name}.staging-")
}

/// Removes staging directories of `target` left behind by a killed run.
///
/// Must be called with the work directory lock held, so no live build owns
/// any of them.
fn reap_staging(work_dir: &Path, target: &Path) -> Result<()> {
    let prefix = staging_prefix(target);
    let entries = match fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        warn!("Removing abandoned staging directory {}", path.display());
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn discard(staging: &Path) {
    if staging.exists()
        && let Err(e) = fs::remove_dir_all(staging)
    {
        warn!("Failed to remove staging directory {}: {}", staging.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(report_dir: Option<&str>) -> LaunchConfig {
        LaunchConfig {
            agent_jar_path: PathBuf::from("/m/agent.jar"),
            native_agent_library_path: PathBuf::from("/w/fray-jvmti/libjvmti.so"),
            runtime_work_dir: PathBuf::from("/w/fray-java"),
            jvm_executable_path: PathBuf::from("/w/fray-java/bin/java"),
            report_dir: report_dir.map(PathBuf::from),
        }
    }

    #[test]
    fn test_arg_line_appends() {
        let config = launch(None);
        assert_eq!(
            config.append_to_arg_line(Some("-Xmx1g")),
            "-Xmx1g -javaagent:/m/agent.jar -agentpath:/w/fray-jvmti/libjvmti.so"
        );
        assert_eq!(
            config.append_to_arg_line(None),
            " -javaagent:/m/agent.jar -agentpath:/w/fray-jvmti/libjvmti.so"
        );
    }

    #[test]
    fn test_arg_line_with_report_dir() {
        let config = launch(Some("/w/fray-report"));
        assert!(config
            .agent_arguments()
            .ends_with(" -Dfray.workDir=/w/fray-report"));
    }

    #[test]
    fn test_properties_text_escapes_windows_paths() {
        let config = LaunchConfig {
            agent_jar_path: PathBuf::from(r"C:\m2\agent.jar"),
            native_agent_library_path: PathBuf::from(r"C:\w\fray-jvmti\jvmti.dll"),
            runtime_work_dir: PathBuf::from(r"C:\w\fray-java"),
            jvm_executable_path: PathBuf::from(r"C:\w\fray-java\bin\java.exe"),
            report_dir: None,
        };

        assert_eq!(
            config.to_properties_text(Some("-Xmx1g")),
            concat!(
                r"argLine=-Xmx1g -javaagent:C:\\m2\\agent.jar -agentpath:C:\\w\\fray-jvmti\\jvmti.dll",
                "\n",
                r"jvm=C:\\w\\fray-java\\bin\\java.exe",
                "\n",
            )
        );
    }

    #[test]
    fn test_escape_property() {
        assert_eq!(escape_property("a=b:c", true), r"a\=b\:c");
        assert_eq!(escape_property("a=b:c", false), "a=b:c");
        assert_eq!(escape_property(" -javaagent:x", false), r"\ -javaagent:x");
        assert_eq!(escape_property("line\nbreak", false), r"line\nbreak");
    }

    #[test]
    fn test_properties() {
        let props = launch(None).to_properties(None);
        assert_eq!(props.len(), 2);
        assert_eq!(props["jvm"], "/w/fray-java/bin/java");
        assert!(props["argLine"].contains("-javaagent:/m/agent.jar"));
    }
}
