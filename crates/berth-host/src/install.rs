use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::distro::HostPlatform;
use crate::engine::ContainerEngine;
use crate::plan::{InstallPlan, InstallStep};
use crate::HostError;

/// How privileged steps are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Elevation {
    /// Already root: run steps as-is.
    #[default]
    Direct,
    /// Prefix each privileged command with `sudo`.
    Sudo,
}

impl Elevation {
    pub fn for_uid(euid: u32) -> Self {
        if euid == 0 {
            Self::Direct
        } else {
            Self::Sudo
        }
    }

    fn wrap(self, command: CommandSpec) -> CommandSpec {
        match self {
            Self::Direct => command,
            Self::Sudo => {
                let mut wrapped = CommandSpec::new("sudo").arg(command.program).args(command.args);
                wrapped.stdin = command.stdin;
                wrapped
            }
        }
    }
}

fn step_error(
    step: usize,
    total: usize,
    command: &CommandSpec,
    result: &std::io::Result<CommandOutput>,
) -> HostError {
    let (status, output) = match result {
        Ok(out) => (out.status_description(), out.output_tail()),
        Err(e) => ("could not be started".to_owned(), e.to_string()),
    };
    HostError::Installation {
        step,
        total,
        command: command.to_string(),
        status,
        output,
    }
}

fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
    step: usize,
    total: usize,
) -> Result<CommandOutput, HostError> {
    let result = runner.run(command);
    match result {
        Ok(out) if out.success => Ok(out),
        other => Err(step_error(step, total, command, &other)),
    }
}

/// Run every step of `plan` in order, stopping at the first failure.
///
/// Nothing is rolled back on failure; the returned error names the failing step
/// and carries the tail of its output.
pub fn execute_plan(
    plan: &InstallPlan,
    runner: &dyn CommandRunner,
    elevation: Elevation,
) -> Result<(), HostError> {
    let total = plan.len();
    for (index, step) in plan.steps.iter().enumerate() {
        let number = index + 1;
        tracing::info!("install step {number}/{total}: {step}");

        match step {
            InstallStep::Run { command } => {
                run_checked(runner, &elevation.wrap(command.clone()), number, total)?;
            }
            InstallStep::ImportKey { url, keyring } => {
                let fetch = CommandSpec::new("curl").args(["-fsSL", url.as_str()]);
                let key = run_checked(runner, &fetch, number, total)?;
                let dearmor = CommandSpec::new("gpg")
                    .args(["--dearmor", "-o", keyring.as_str()])
                    .with_stdin(key.stdout);
                run_checked(runner, &elevation.wrap(dearmor), number, total)?;
            }
            InstallStep::WriteFile { path, contents } => {
                let tee = CommandSpec::new("tee")
                    .arg(path.as_str())
                    .with_stdin(contents.as_bytes());
                run_checked(runner, &elevation.wrap(tee), number, total)?;
            }
        }
    }
    tracing::info!("installed {} ({total} steps)", plan.engine);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStart {
    Started,
    /// The engine has to be started by hand (Docker Desktop on macOS).
    Manual(String),
}

/// Enable and start the Docker service so the daemon survives reboots.
pub fn start_engine_service(
    runner: &dyn CommandRunner,
    platform: HostPlatform,
    elevation: Elevation,
) -> Result<ServiceStart, HostError> {
    match platform {
        HostPlatform::Linux => {
            let command =
                elevation.wrap(CommandSpec::new("systemctl").args(["enable", "--now", "docker"]));
            match runner.run(&command) {
                Ok(out) if out.success => Ok(ServiceStart::Started),
                Ok(out) => Err(HostError::ServiceStart {
                    engine: ContainerEngine::Docker,
                    detail: format!("{}: {}", out.status_description(), out.output_tail()),
                }),
                Err(e) => Err(HostError::ServiceStart {
                    engine: ContainerEngine::Docker,
                    detail: e.to_string(),
                }),
            }
        }
        HostPlatform::MacOs => Ok(ServiceStart::Manual(
            "Please start Docker Desktop manually on macOS.".to_owned(),
        )),
        HostPlatform::Other => Err(HostError::UnsupportedPlatform(platform.to_string())),
    }
}
