use crate::dialect::{ComposeDialect, DialectResolver};
use crate::CoreError;
use berth_host::{CommandRunner, CommandSpec, ContainerEngine};
use std::fmt;
use std::path::Path;

pub const PODMAN_COMPOSE: &str = "podman-compose";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOperation {
    Pull,
    Start,
    Stop,
    /// Restart one service, or the whole project when `None`.
    Restart(Option<String>),
}

impl LifecycleOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart(_) => "restart",
        }
    }

    /// Compose arguments after `-f <file>`. Podman pulls without a policy flag
    /// and always restarts the whole project.
    pub fn compose_args(&self, engine: ContainerEngine) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Pull => match engine {
                ContainerEngine::Docker => &["pull", "--policy", "always"],
                ContainerEngine::Podman => &["pull"],
            },
            Self::Start => &["up", "-d", "--force-recreate"],
            Self::Stop => &["down"],
            Self::Restart(_) => &["restart"],
        };
        let mut args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        if let (Self::Restart(Some(target)), ContainerEngine::Docker) = (self, engine) {
            args.push(target.clone());
        }
        args
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart(Some(target)) => write!(f, "restart {target}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Build the full compose invocation. `dialect` is ignored for Podman, which
/// always goes through `podman-compose`.
pub fn compose_command(
    engine: ContainerEngine,
    dialect: ComposeDialect,
    compose_file: &Path,
    operation: &LifecycleOperation,
) -> CommandSpec {
    let base = match engine {
        ContainerEngine::Docker => dialect.base_command(),
        ContainerEngine::Podman => CommandSpec::new(PODMAN_COMPOSE),
    };
    base.arg("-f")
        .arg(compose_file.to_string_lossy())
        .args(operation.compose_args(engine))
}

/// Issues compose operations for one engine. Failures are returned as-is and
/// never retried here.
pub struct LifecycleManager<'a> {
    runner: &'a dyn CommandRunner,
    dialect: DialectResolver,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            dialect: DialectResolver::new(),
        }
    }

    /// Dialect resolved so far in this session, if any.
    pub fn dialect(&self) -> Option<ComposeDialect> {
        self.dialect.cached()
    }

    pub fn resolve_dialect(&self) -> Result<ComposeDialect, CoreError> {
        self.dialect.resolve(self.runner)
    }

    /// Build the command that `execute` would run, resolving the Docker
    /// dialect if needed.
    pub fn command_for(
        &self,
        engine: ContainerEngine,
        operation: &LifecycleOperation,
        compose_file: &Path,
    ) -> Result<CommandSpec, CoreError> {
        match engine {
            ContainerEngine::Podman => Ok(compose_command(
                engine,
                ComposeDialect::Standalone,
                compose_file,
                operation,
            )),
            ContainerEngine::Docker => {
                if !self.runner.succeeds(&CommandSpec::new("docker").arg("--version")) {
                    return Err(CoreError::EngineNotInstalled(ContainerEngine::Docker));
                }
                let dialect = self.resolve_dialect()?;
                Ok(compose_command(engine, dialect, compose_file, operation))
            }
        }
    }

    pub fn execute(
        &self,
        engine: ContainerEngine,
        operation: &LifecycleOperation,
        compose_file: &Path,
    ) -> Result<(), CoreError> {
        let command = self.command_for(engine, operation, compose_file)?;
        tracing::info!("{operation}: {command}");

        let failure = |detail: String| CoreError::LifecycleOperation {
            operation: operation.name().to_owned(),
            engine,
            command: command.to_string(),
            detail,
        };

        match self.runner.run(&command) {
            Ok(out) if out.success => Ok(()),
            Ok(out) => Err(failure(format!(
                "{}: {}",
                out.status_description(),
                out.output_tail()
            ))),
            Err(e) => Err(failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_host::mock::{Reply, ScriptedRunner};

    const FILE: &str = "docker-compose.yml";

    fn all_operations() -> Vec<LifecycleOperation> {
        vec![
            LifecycleOperation::Pull,
            LifecycleOperation::Start,
            LifecycleOperation::Stop,
            LifecycleOperation::Restart(None),
            LifecycleOperation::Restart(Some("pangolin".to_owned())),
        ]
    }

    #[test]
    fn docker_plugin_commands() {
        let line = |op: LifecycleOperation| {
            compose_command(ContainerEngine::Docker, ComposeDialect::Plugin, Path::new(FILE), &op)
                .command_line()
        };
        assert_eq!(
            line(LifecycleOperation::Pull),
            "docker compose -f docker-compose.yml pull --policy always"
        );
        assert_eq!(
            line(LifecycleOperation::Start),
            "docker compose -f docker-compose.yml up -d --force-recreate"
        );
        assert_eq!(line(LifecycleOperation::Stop), "docker compose -f docker-compose.yml down");
        assert_eq!(
            line(LifecycleOperation::Restart(None)),
            "docker compose -f docker-compose.yml restart"
        );
        assert_eq!(
            line(LifecycleOperation::Restart(Some("gerbil".to_owned()))),
            "docker compose -f docker-compose.yml restart gerbil"
        );
    }

    #[test]
    fn docker_standalone_commands() {
        let cmd = compose_command(
            ContainerEngine::Docker,
            ComposeDialect::Standalone,
            Path::new(FILE),
            &LifecycleOperation::Pull,
        );
        assert_eq!(
            cmd.command_line(),
            "docker-compose -f docker-compose.yml pull --policy always"
        );
    }

    #[test]
    fn podman_ignores_dialect() {
        for op in all_operations() {
            for dialect in [ComposeDialect::Plugin, ComposeDialect::Standalone] {
                let cmd = compose_command(ContainerEngine::Podman, dialect, Path::new(FILE), &op);
                assert_eq!(cmd.program, "podman-compose", "{op} via {dialect}");
                assert_eq!(cmd.args[..2], ["-f", FILE]);
            }
        }
    }

    #[test]
    fn podman_operation_mapping() {
        let line = |op: LifecycleOperation| {
            compose_command(ContainerEngine::Podman, ComposeDialect::Plugin, Path::new(FILE), &op)
                .command_line()
        };
        assert_eq!(line(LifecycleOperation::Pull), "podman-compose -f docker-compose.yml pull");
        assert_eq!(
            line(LifecycleOperation::Start),
            "podman-compose -f docker-compose.yml up -d --force-recreate"
        );
        assert_eq!(line(LifecycleOperation::Stop), "podman-compose -f docker-compose.yml down");
        assert_eq!(
            line(LifecycleOperation::Restart(Some("pangolin".to_owned()))),
            "podman-compose -f docker-compose.yml restart"
        );
    }

    #[test]
    fn podman_execution_never_probes_docker() {
        let runner = ScriptedRunner::new().on("podman-compose", Reply::ok(""));
        let manager = LifecycleManager::new(&runner);
        for op in all_operations() {
            manager
                .execute(ContainerEngine::Podman, &op, Path::new(FILE))
                .unwrap();
        }
        assert!(runner.lines().iter().all(|l| l.starts_with("podman-compose -f ")));
        assert_eq!(manager.dialect(), None);
    }

    #[test]
    fn docker_requires_installed_engine() {
        let runner = ScriptedRunner::new().on("docker compose version", Reply::ok(""));
        let manager = LifecycleManager::new(&runner);
        let err = manager
            .execute(ContainerEngine::Docker, &LifecycleOperation::Start, Path::new(FILE))
            .unwrap_err();
        assert!(matches!(err, CoreError::EngineNotInstalled(ContainerEngine::Docker)));
    }

    #[test]
    fn installed_check_asks_only_for_docker_version() {
        let runner = ScriptedRunner::new()
            .on("docker --version", Reply::ok("Docker version 27.3.1"))
            .on("docker compose version", Reply::ok(""));
        let manager = LifecycleManager::new(&runner);
        manager
            .command_for(ContainerEngine::Docker, &LifecycleOperation::Pull, Path::new(FILE))
            .unwrap();
        assert_eq!(runner.lines(), vec!["docker --version", "docker compose version"]);
    }

    #[test]
    fn docker_dialect_resolved_once_per_manager() {
        let runner = ScriptedRunner::new()
            .on("docker --version", Reply::ok(""))
            .on("docker compose version", Reply::ok(""))
            .on("docker compose -f", Reply::ok(""));
        let manager = LifecycleManager::new(&runner);
        manager
            .execute(ContainerEngine::Docker, &LifecycleOperation::Pull, Path::new(FILE))
            .unwrap();
        manager
            .execute(ContainerEngine::Docker, &LifecycleOperation::Start, Path::new(FILE))
            .unwrap();
        assert_eq!(runner.count("docker compose version"), 1);
        assert_eq!(manager.dialect(), Some(ComposeDialect::Plugin));
    }

    #[test]
    fn failure_carries_operation_engine_and_output() {
        let runner = ScriptedRunner::new()
            .on("docker --version", Reply::ok(""))
            .on("docker compose version", Reply::ok(""))
            .on("docker compose -f", Reply::fail(1, "manifest unknown"));
        let manager = LifecycleManager::new(&runner);
        let err = manager
            .execute(ContainerEngine::Docker, &LifecycleOperation::Pull, Path::new(FILE))
            .unwrap_err();
        match err {
            CoreError::LifecycleOperation {
                operation,
                engine,
                command,
                detail,
            } => {
                assert_eq!(operation, "pull");
                assert_eq!(engine, ContainerEngine::Docker);
                assert!(command.contains("pull --policy always"));
                assert!(detail.contains("manifest unknown"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.count("docker compose -f"), 1, "failures are not retried");
    }
}
