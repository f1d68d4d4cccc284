//! # frayprep
//!
//! **Runtime provisioning for the fray concurrency tester**
//!
//! fray runs tests on a JDK whose standard library has been instrumented
//! at link time, with a JVMTI agent attached. This crate prepares both under
//! a work directory and returns the JVM flags a test runner must use.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            frayprep                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                   Provisioner (provision)                  │  │
//! │  │  plan → lock → runtime image → agent bundle → LaunchConfig │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │                 │                  │                    │
//! │  ┌─────────────┐  ┌──────────────┐  ┌───────────────────┐        │
//! │  │ ArtifactSet │  │ jlink        │  │ bundle::extract   │        │
//! │  │ id → file   │  │ ToolRunner   │  │ zip → directory   │        │
//! │  │ os/arch     │  │ exit status  │  │ traversal checks  │        │
//! │  └─────────────┘  └──────────────┘  └───────────────────┘        │
//! │                          │                                       │
//! │  ┌───────────────────────────────────────────────────────────┐   │
//! │  │   cache: advisory lock │ completion markers │ fingerprints│   │
//! │  └───────────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Work Directory Layout
//!
//! ```text
//! <work_dir>/fray-java/    linked runtime image (bin/java)
//! <work_dir>/fray-jvmti/   native agent bundle (libjvmti.so)
//! <work_dir>/fray-report/  report directory passed to fray
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use frayprep::{ArtifactSet, PlatformKey, ProvisionConfig, Provisioner};
//! use std::path::Path;
//!
//! fn main() -> frayprep::Result<()> {
//!     let artifacts = ArtifactSet::from_json_file(
//!         Path::new("target/fray-artifacts.json"),
//!         PlatformKey::detect(),
//!     )?;
//!     let provisioner = Provisioner::new(ProvisionConfig::from_env()?, artifacts);
//!     let launch = provisioner.provision()?;
//!     println!("{}", launch.append_to_arg_line(None));
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod jlink;
pub mod platform;
pub mod provision;

// Re-exports
pub use artifact::{ArtifactRef, ArtifactScheme, ArtifactSet};
pub use config::ProvisionConfig;
pub use error::{Error, Result};
pub use jlink::{JlinkRequest, RuntimeImageBuilder, SystemToolRunner, ToolOutput, ToolRunner};
pub use platform::{OsFamily, PlatformKey};
pub use provision::{LaunchConfig, Provisioned, Provisioner, StepOutcome};
