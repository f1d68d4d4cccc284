//! Runtime image linking.
//!
//! The instrumented runtime is produced by `jlink` with the fray JDK jar
//! attached as a `-J-javaagent`, so the instrumentation rewrites the
//! standard library while it is being linked:
//!
//! ```text
//! jlink -J-javaagent:<jdk.jar>
//!       -J--module-path=<deps> -J--add-modules=<extra module>
//!       -J--class-path=<deps>
//!       --output=<dir> --add-modules=ALL-MODULE-PATH
//!       --fray-instrumentation
//! ```
//!
//! `<deps>` is every resolved artifact except the instrumentation agent,
//! which must not become a module of the image it instruments.
//!
//! Process execution sits behind [`ToolRunner`] and returns a
//! [`ToolOutput`]; a non-zero exit is an [`Error::ExternalToolFailure`],
//! never inferred from side effects.

use crate::constants::FRAY_INSTRUMENTATION_FLAG;
use crate::error::{Error, Result};
use crate::platform::OsFamily;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// =============================================================================
// Tool Execution
// =============================================================================

/// Captured result of an external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Returns true if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns stdout and stderr joined for error reports.
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Runs external programs to completion.
pub trait ToolRunner: Send + Sync {
    /// Runs `program` with `args`, blocking until it exits.
    ///
    /// Returns `Ok` for any exit status; only failures to launch or wait
    /// are errors.
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput>;
}

/// [`ToolRunner`] backed by `std::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemToolRunner {
    timeout: Option<Duration>,
}

impl SystemToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills the process and fails with [`Error::Timeout`] after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        let tool = program.display().to_string();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ToolLaunchFailed {
                tool: tool.clone(),
                reason: e.to_string(),
            })?;

        // Both pipes are drained while waiting; a full pipe stalls the child.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = self.timeout.map(|t| (Instant::now() + t, t));
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some((deadline, duration)) = deadline
                && Instant::now() > deadline
            {
                warn!("{} exceeded {:?}, killing", tool, duration);
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout {
                    operation: tool,
                    duration,
                });
            }
            thread::sleep(Duration::from_millis(50));
        };

        Ok(ToolOutput {
            code: status.code(),
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

// =============================================================================
// Image Building
// =============================================================================

/// Inputs of one `jlink` invocation.
#[derive(Debug, Clone)]
pub struct JlinkRequest {
    /// Module and class path, agent artifact already excluded.
    pub module_path: Vec<PathBuf>,
    /// Jar applied as `-J-javaagent` during linking.
    pub instrumentation_agent_jar: PathBuf,
    /// Image destination; must not exist yet.
    pub output_dir: PathBuf,
    /// Module added to the link-time JVM.
    pub extra_module: String,
}

impl JlinkRequest {
    /// Composes the jlink argument vector.
    pub fn args(&self) -> Result<Vec<OsString>> {
        let deps = std::env::join_paths(&self.module_path)
            .map_err(|e| Error::Config(format!("invalid module path entry: {e}")))?;

        Ok(vec![
            prefixed("-J-javaagent:", self.instrumentation_agent_jar.as_os_str()),
            prefixed("-J--module-path=", &deps),
            OsString::from(format!("-J--add-modules={}", self.extra_module)),
            prefixed("-J--class-path=", &deps),
            prefixed("--output=", self.output_dir.as_os_str()),
            OsString::from("--add-modules=ALL-MODULE-PATH"),
            OsString::from(FRAY_INSTRUMENTATION_FLAG),
        ])
    }
}

fn prefixed(prefix: &str, value: &std::ffi::OsStr) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(value);
    arg
}

/// Links an instrumented runtime image.
pub struct RuntimeImageBuilder<'a> {
    jlink: &'a Path,
    runner: &'a dyn ToolRunner,
    os: OsFamily,
}

impl<'a> RuntimeImageBuilder<'a> {
    pub fn new(jlink: &'a Path, runner: &'a dyn ToolRunner, os: OsFamily) -> Self {
        Self { jlink, runner, os }
    }

    /// Runs jlink and verifies the produced image.
    ///
    /// Fails with [`Error::ExternalToolFailure`] on a non-zero exit and with
    /// [`Error::InvalidRuntimeImage`] when the image lacks its launcher.
    pub fn build(&self, request: &JlinkRequest) -> Result<PathBuf> {
        let args = request.args()?;
        info!(
            "Executing command: {} {}",
            self.jlink.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = self.runner.run(self.jlink, &args)?;
        for line in output.stdout.lines() {
            info!("jlink: {}", line);
        }
        for line in output.stderr.lines() {
            debug!("jlink stderr: {}", line);
        }

        if !output.success() {
            return Err(Error::ExternalToolFailure {
                tool: self.jlink.display().to_string(),
                code: output.code,
                output: output.combined(),
            });
        }

        verify_image(&request.output_dir, self.os)
    }
}

/// Checks that `image_dir` contains a launcher and returns its path.
pub fn verify_image(image_dir: &Path, os: OsFamily) -> Result<PathBuf> {
    let java = image_dir.join(os.java_executable());
    if !java.is_file() {
        return Err(Error::InvalidRuntimeImage {
            path: image_dir.to_path_buf(),
            reason: format!("missing {}", os.java_executable()),
        });
    }
    Ok(java)
}
