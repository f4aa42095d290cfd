use crate::cancel::CancelToken;
use crate::config::DeployConfig;
use crate::dialect::ComposeDialect;
use crate::lifecycle::{LifecycleManager, LifecycleOperation};
use crate::readiness::{ReadinessWaiter, Sleeper};
use crate::CoreError;
use berth_host::{
    execute_plan, plan, start_engine_service, CommandRunner, ContainerEngine, DistroDetector,
    Elevation, EngineProbe, HostError, HostIdentity, HostPlatform, InstallPlan, PlanOptions,
    ServiceStart,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of `Session::ensure_installed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    AlreadyInstalled,
    Installed {
        plan: InstallPlan,
        service: ServiceStart,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyContainer {
    pub name: String,
    pub attempts: u32,
}

/// One deployment on the local host: a fixed engine and compose file, a
/// lazily resolved compose dialect, and the containers that must come up.
///
/// Operations are blocking and must not be issued concurrently for the same
/// compose project.
pub struct Session<'a> {
    engine: ContainerEngine,
    compose_file: PathBuf,
    runner: &'a dyn CommandRunner,
    identity: &'a dyn HostIdentity,
    sleeper: &'a dyn Sleeper,
    lifecycle: LifecycleManager<'a>,
    attempts: u32,
    interval: Duration,
    containers: Vec<String>,
    cancel: CancelToken,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &DeployConfig,
        runner: &'a dyn CommandRunner,
        identity: &'a dyn HostIdentity,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            engine: config.engine,
            compose_file: config.compose_file.clone(),
            runner,
            identity,
            sleeper,
            lifecycle: LifecycleManager::new(runner),
            attempts: config.readiness.attempts,
            interval: config.readiness.interval(),
            containers: config.readiness.containers.clone(),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn engine(&self) -> ContainerEngine {
        self.engine
    }

    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    pub fn probe(&self) -> EngineProbe<'a> {
        EngineProbe::new(self.runner, self.identity)
    }

    /// Dialect resolved so far; `None` for Podman or before the first Docker
    /// operation.
    pub fn dialect(&self) -> Option<ComposeDialect> {
        self.lifecycle.dialect()
    }

    pub fn resolve_dialect(&self) -> Result<ComposeDialect, CoreError> {
        self.lifecycle.resolve_dialect()
    }

    /// Install Docker when it is missing, then enable its service.
    ///
    /// Podman and macOS hosts are never provisioned automatically. A failed
    /// install leaves the host as it was at the failing step.
    pub fn ensure_installed(
        &self,
        detector: &DistroDetector,
        options: &PlanOptions,
    ) -> Result<Provisioned, CoreError> {
        if self.probe().is_engine_installed(self.engine) {
            tracing::info!("{} is already installed", self.engine);
            return Ok(Provisioned::AlreadyInstalled);
        }
        if self.engine == ContainerEngine::Podman {
            return Err(HostError::NoInstallPlan(self.engine).into());
        }

        match self.identity.platform() {
            HostPlatform::Linux => {}
            HostPlatform::MacOs => {
                return Err(HostError::UnsupportedPlatform(
                    "macos (install Docker Desktop manually)".to_owned(),
                )
                .into());
            }
            other => return Err(HostError::UnsupportedPlatform(other.to_string()).into()),
        }

        let profile = detector.detect(self.runner)?;
        let plan = plan(&profile, options)?;
        let elevation = Elevation::for_uid(self.identity.effective_uid());
        execute_plan(&plan, self.runner, elevation)?;
        let service = start_engine_service(self.runner, HostPlatform::Linux, elevation)?;

        Ok(Provisioned::Installed { plan, service })
    }

    /// Verify the engine is installed and usable before lifecycle operations.
    ///
    /// Authorization is checked before the daemon so that a permission problem
    /// is not reported as a stopped daemon. Podman has no daemon or group check.
    pub fn preflight(&self) -> Result<(), CoreError> {
        let probe = self.probe();
        if !probe.is_engine_installed(self.engine) {
            return Err(CoreError::EngineNotInstalled(self.engine));
        }
        if let Some(group) = self.engine.admin_group() {
            if !probe.is_caller_authorized() {
                return Err(CoreError::Permission {
                    engine: self.engine,
                    group: group.to_owned(),
                });
            }
        }
        if self.engine == ContainerEngine::Docker && !probe.is_engine_running() {
            return Err(CoreError::DaemonNotRunning);
        }
        Ok(())
    }

    /// Run one lifecycle operation. After start or restart, and when `wait` is
    /// set, block until the affected containers report running.
    pub fn run(
        &self,
        operation: &LifecycleOperation,
        wait: bool,
    ) -> Result<Vec<ReadyContainer>, CoreError> {
        self.lifecycle
            .execute(self.engine, operation, &self.compose_file)?;

        if !wait {
            return Ok(Vec::new());
        }
        let targets: Vec<String> = match operation {
            LifecycleOperation::Start | LifecycleOperation::Restart(None) => {
                self.containers.clone()
            }
            LifecycleOperation::Restart(Some(target)) => vec![target.clone()],
            LifecycleOperation::Pull | LifecycleOperation::Stop => Vec::new(),
        };
        targets.iter().map(|name| self.wait_for(name)).collect()
    }

    pub fn wait_for(&self, container: &str) -> Result<ReadyContainer, CoreError> {
        let attempts = self.waiter().wait(self.engine, container)?;
        Ok(ReadyContainer {
            name: container.to_owned(),
            attempts,
        })
    }

    pub fn waiter(&self) -> ReadinessWaiter<'a> {
        ReadinessWaiter::new(self.runner, self.sleeper)
            .with_attempts(self.attempts)
            .with_interval(self.interval)
            .with_cancel(self.cancel.clone())
    }

    /// Preflight, pull, start, and wait for the configured containers.
    pub fn deploy(&self) -> Result<Vec<ReadyContainer>, CoreError> {
        self.preflight()?;
        self.run(&LifecycleOperation::Pull, false)?;
        self.run(&LifecycleOperation::Start, true)
    }
}
