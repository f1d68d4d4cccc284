//! frayprep - fray runtime provisioning CLI
//!
//! Called by build-tool integrations before running tests under fray.
//!
//! ## Usage
//!
//! ```sh
//! frayprep provision --artifacts target/fray-artifacts.json --format properties
//! frayprep provision --artifact jdk=/m2/jdk.jar --artifact agent=/m2/agent.jar \
//!     --artifact jvmti-linux-amd64=/m2/jvmti.jar --scheme short
//! frayprep platform
//! frayprep clean --work-dir target/fray
//! ```
//!
//! Logs go to stderr (`RUST_LOG` controls verbosity); results go to stdout.

use clap::{Args, Parser, Subcommand, ValueEnum};
use frayprep::{
    ArtifactRef, ArtifactScheme, ArtifactSet, PlatformKey, ProvisionConfig, Provisioner,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "frayprep",
    version,
    about = "Provision an instrumented JDK and JVMTI agent for fray"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or reuse the runtime image and agent bundle, print launch settings.
    Provision(ProvisionArgs),
    /// Print the detected platform key.
    Platform(PlatformArgs),
    /// Remove provisioned artifacts from the work directory.
    Clean(WorkDirArgs),
}

#[derive(Args)]
struct WorkDirArgs {
    /// Work directory (default: $FRAY_WORK_DIR or target/fray).
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[derive(Args)]
struct PlatformArgs {
    /// Override the detected OS name (JVM `os.name` values accepted).
    #[arg(long)]
    os: Option<String>,
    /// Override the detected architecture (JVM `os.arch` values).
    #[arg(long)]
    arch: Option<String>,
}

#[derive(Args)]
struct ProvisionArgs {
    #[command(flatten)]
    work_dir: WorkDirArgs,
    #[command(flatten)]
    platform: PlatformArgs,
    /// JSON artifact table written by the host build tool.
    #[arg(long)]
    artifacts: Option<PathBuf>,
    /// Additional artifact as IDENTIFIER=PATH (repeatable).
    #[arg(long = "artifact", value_parser = parse_artifact)]
    extra_artifacts: Vec<ArtifactRef>,
    /// Identifier scheme: maven or short.
    #[arg(long)]
    scheme: Option<String>,
    /// jlink executable.
    #[arg(long)]
    jlink: Option<PathBuf>,
    /// Kill jlink after this many seconds.
    #[arg(long)]
    jlink_timeout: Option<u64>,
    /// Do not pass -Dfray.workDir to the test JVM.
    #[arg(long)]
    no_report_dir: bool,
    /// Existing test-runner argument line to extend.
    #[arg(long, allow_hyphen_values = true)]
    arg_line: Option<String>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// LaunchConfig plus step outcomes as JSON.
    Json,
    /// `argLine=` and `jvm=` lines, escaped as `java.util.Properties` text.
    Properties,
    /// The extended argument line only.
    ArgLine,
}

fn parse_artifact(value: &str) -> Result<ArtifactRef, String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok(ArtifactRef::new(id, path)),
        _ => Err(format!("expected IDENTIFIER=PATH, got '{value}'")),
    }
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Provision(args) => provision(args),
        Command::Platform(args) => platform(args),
        Command::Clean(args) => clean(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("frayprep: {e}");
            ExitCode::FAILURE
        }
    }
}

fn platform_key(args: &PlatformArgs) -> PlatformKey {
    let detected = PlatformKey::detect();
    PlatformKey::new(
        args.os.clone().unwrap_or_else(|| detected.os_name().to_string()),
        args.arch.clone().unwrap_or_else(|| detected.arch().to_string()),
    )
}

fn base_config(args: &WorkDirArgs) -> frayprep::Result<ProvisionConfig> {
    let mut config = ProvisionConfig::from_env()?;
    if let Some(dir) = &args.work_dir {
        config.work_dir = dir.clone();
    }
    Ok(config)
}

fn provision(args: ProvisionArgs) -> frayprep::Result<()> {
    let mut config = base_config(&args.work_dir)?;
    if let Some(scheme) = &args.scheme {
        config = config.with_scheme(scheme.parse::<ArtifactScheme>()?);
    }
    if let Some(jlink) = args.jlink {
        config = config.with_jlink(jlink);
    }
    if let Some(secs) = args.jlink_timeout {
        config = config.with_jlink_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    if args.no_report_dir {
        config = config.with_report_property(false);
    }

    let artifacts = collect_artifacts(
        args.artifacts.as_deref(),
        args.extra_artifacts,
        platform_key(&args.platform),
    )?;

    let provisioned = Provisioner::new(config, artifacts).provision_detailed()?;
    let launch = &provisioned.launch;

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&provisioned)
                .map_err(|e| frayprep::Error::Config(e.to_string()))?;
            println!("{json}");
        }
        OutputFormat::Properties => {
            print!("{}", launch.to_properties_text(args.arg_line.as_deref()));
        }
        OutputFormat::ArgLine => {
            println!("{}", launch.append_to_arg_line(args.arg_line.as_deref()));
        }
    }
    Ok(())
}

/// Merges `--artifact` flags with the JSON table.
///
/// Flags come first so they override table entries with the same identifier.
fn collect_artifacts(
    table: Option<&Path>,
    flags: Vec<ArtifactRef>,
    key: PlatformKey,
) -> frayprep::Result<ArtifactSet> {
    let mut artifacts = flags;
    if let Some(path) = table {
        let loaded = ArtifactSet::from_json_file(path, key.clone())?;
        artifacts.extend(loaded.artifacts().iter().cloned());
    }
    Ok(ArtifactSet::with_platform(artifacts, key))
}

fn platform(args: PlatformArgs) -> frayprep::Result<()> {
    let key = platform_key(&args);
    println!("{}", key.variant_suffix()?);
    Ok(())
}

fn clean(args: WorkDirArgs) -> frayprep::Result<()> {
    let config = base_config(&args)?;
    let artifacts = ArtifactSet::with_platform(Vec::new(), PlatformKey::detect());
    Provisioner::new(config, artifacts).clean()
}
