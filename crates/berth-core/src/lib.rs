//! Orchestration layer for Berth deployments.
//!
//! This crate resolves which compose command form the host offers, turns
//! pull/start/stop/restart requests into exact compose invocations for Docker
//! or Podman, polls containers until they report running, and ties these
//! together with host provisioning in the `Session` used by every front end.

pub mod cancel;
pub mod config;
pub mod dialect;
pub mod lifecycle;
pub mod readiness;
pub mod session;

pub use cancel::{install_signal_handler, CancelToken};
pub use config::{DeployConfig, ReadinessConfig};
pub use dialect::{resolve_dialect, ComposeDialect, DialectResolver};
pub use lifecycle::{compose_command, LifecycleManager, LifecycleOperation};
pub use readiness::{
    inspect_running, ContainerRunState, ReadinessWaiter, Sleeper, ThreadSleeper, WaitState,
};
pub use session::{Provisioned, ReadyContainer, Session};

use berth_host::{ContainerEngine, HostError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("config error: {0}")]
    Config(String),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not installed")]
    EngineNotInstalled(ContainerEngine),
    #[error("the Docker daemon is not running")]
    DaemonNotRunning,
    #[error("permission denied: the current user cannot use {engine}; add it to the '{group}' group or run as root")]
    Permission {
        engine: ContainerEngine,
        group: String,
    },
    #[error("neither 'docker compose' nor 'docker-compose' command is available")]
    DialectResolution,
    #[error("failed to {operation} containers with {engine} ({command}): {detail}")]
    LifecycleOperation {
        operation: String,
        engine: ContainerEngine,
        command: String,
        detail: String,
    },
    #[error("container {container} did not start within {seconds} seconds ({attempts} attempts)")]
    ReadinessTimeout {
        container: String,
        attempts: u32,
        seconds: u64,
    },
    #[error("waiting for container {0} was cancelled")]
    Cancelled(String),
}
