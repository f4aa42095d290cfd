use super::{colorize_status, ConfigSource, EXIT_FAILURE, EXIT_SUCCESS};
use berth_core::Session;
use berth_host::{ContainerEngine, HostPlatform};

pub fn run(session: &Session<'_>, source: &ConfigSource, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;
    let engine = session.engine();

    if source.path.exists() {
        checks.push(Check::info(
            "config",
            &format!("Using {}", source.path.display()),
        ));
    } else {
        checks.push(Check::info("config", "No config file, using defaults"));
    }

    let probe = session.probe();
    if probe.is_engine_installed(engine) {
        checks.push(Check::pass("installed", &format!("{engine} is installed")));
    } else {
        all_pass = false;
        let hint = match engine {
            ContainerEngine::Docker => "run `berth install`",
            ContainerEngine::Podman => {
                "install podman and podman-compose with the system package manager"
            }
        };
        checks.push(Check::fail(
            "installed",
            &format!("{engine} is not installed ({hint})"),
        ));
        return print_results(&checks, all_pass, json_output);
    }

    match engine {
        ContainerEngine::Docker => check_docker(session, &mut checks, &mut all_pass),
        ContainerEngine::Podman => checks.push(Check::info(
            "daemon",
            "Podman runs without a daemon; no group membership required",
        )),
    }

    if session.compose_file().exists() {
        checks.push(Check::pass(
            "compose_file",
            &format!("Compose file {} exists", session.compose_file().display()),
        ));
    } else {
        checks.push(Check::warn(
            "compose_file",
            &format!(
                "Compose file {} not found",
                session.compose_file().display()
            ),
        ));
    }

    print_results(&checks, all_pass, json_output)
}

fn check_docker(session: &Session<'_>, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let probe = session.probe();

    if probe.is_caller_authorized() {
        checks.push(Check::pass(
            "authorized",
            "Current user may use the Docker daemon",
        ));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "authorized",
            "Current user is not in the 'docker' group (sudo usermod -aG docker $USER, then log in again)",
        ));
    }

    if probe.is_engine_running() {
        checks.push(Check::pass("daemon", "Docker daemon is running"));
    } else {
        *all_pass = false;
        let hint = if HostPlatform::current() == HostPlatform::MacOs {
            "start Docker Desktop"
        } else {
            "sudo systemctl start docker"
        };
        checks.push(Check::fail(
            "daemon",
            &format!("Docker daemon is not running ({hint})"),
        ));
    }

    match session.resolve_dialect() {
        Ok(dialect) => checks.push(Check::pass(
            "compose",
            &format!("Compose available as '{dialect}'"),
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("compose", &e.to_string()));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("Berth Doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!(
                "  {icon} [{}] {}",
                colorize_status(check.status),
                check.message
            );
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::{DeployConfig, ThreadSleeper};
    use berth_host::mock::{Reply, ScriptedRunner};
    use berth_host::HostIdentity;
    use std::path::PathBuf;

    struct Root;

    impl HostIdentity for Root {
        fn platform(&self) -> HostPlatform {
            HostPlatform::Linux
        }
        fn effective_uid(&self) -> u32 {
            0
        }
        fn group_id(&self, _name: &str) -> Option<u32> {
            None
        }
        fn caller_group_ids(&self) -> Option<Vec<u32>> {
            None
        }
    }

    fn source() -> ConfigSource {
        ConfigSource {
            path: PathBuf::from("/nonexistent/berth.toml"),
            explicit: false,
            engine: None,
            compose_file: None,
        }
    }

    #[test]
    fn healthy_docker_host_passes() {
        let runner = ScriptedRunner::new()
            .on("docker --version", Reply::ok(""))
            .on("docker info", Reply::ok(""))
            .on("docker compose version", Reply::ok(""));
        let sleeper = ThreadSleeper::new();
        let config = DeployConfig::default();
        let session = Session::new(&config, &runner, &Root, &sleeper);
        assert_eq!(run(&session, &source(), true).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn stopped_daemon_fails() {
        let runner = ScriptedRunner::new()
            .on("docker --version", Reply::ok(""))
            .on("docker info", Reply::fail(1, "Cannot connect to the Docker daemon"))
            .on("docker compose version", Reply::ok(""));
        let sleeper = ThreadSleeper::new();
        let config = DeployConfig::default();
        let session = Session::new(&config, &runner, &Root, &sleeper);
        assert_eq!(run(&session, &source(), true).unwrap(), EXIT_FAILURE);
    }

    #[test]
    fn missing_engine_stops_early() {
        let runner = ScriptedRunner::new();
        let sleeper = ThreadSleeper::new();
        let config = DeployConfig::default();
        let session = Session::new(&config, &runner, &Root, &sleeper);
        assert_eq!(run(&session, &source(), true).unwrap(), EXIT_FAILURE);
        assert_eq!(runner.count("docker info"), 0);
    }
}
