//! Host layer for Berth: everything that talks to the machine itself.
//!
//! This crate detects the Linux distribution and CPU architecture, maps a
//! detected profile to an ordered Docker install plan, executes that plan,
//! and probes whether a container engine is installed, running, and usable by
//! the calling user. All external commands go through the `CommandRunner`
//! seam so the decision logic can be exercised with the scripted mock runner.

pub mod command;
pub mod distro;
pub mod engine;
pub mod install;
pub mod mock;
pub mod plan;
pub mod probe;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use distro::{
    detect_from, parse_os_release, Arch, DistroDetector, DistroFamily, DistroProfile,
    HostPlatform,
};
pub use engine::ContainerEngine;
pub use install::{execute_plan, start_engine_service, Elevation, ServiceStart};
pub use plan::{plan, InstallPlan, InstallStep, PlanOptions};
pub use probe::{EngineProbe, HostIdentity, SystemIdentity};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read {path}: {source}")]
    OsRelease {
        path: String,
        source: std::io::Error,
    },
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("unsupported Linux distribution: {0}")]
    UnsupportedDistribution(String),
    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),
    #[error("{family} host does not declare VERSION_CODENAME in os-release")]
    MissingCodename { family: String },
    #[error("unknown container engine '{0}', expected docker or podman")]
    UnknownEngine(String),
    #[error("{0} cannot be installed automatically, install it with the system package manager")]
    NoInstallPlan(ContainerEngine),
    #[error("install step {step} of {total} failed ({command}): {status}\n{output}")]
    Installation {
        step: usize,
        total: usize,
        command: String,
        status: String,
        output: String,
    },
    #[error("failed to start the {engine} service: {detail}")]
    ServiceStart {
        engine: ContainerEngine,
        detail: String,
    },
    #[error("host command failed: {0}")]
    ExecFailed(String),
}
