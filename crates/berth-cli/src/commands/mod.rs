pub mod completions;
pub mod detect;
pub mod doctor;
pub mod install;
pub mod lifecycle;
pub mod plan;
pub mod wait;

use berth_core::{CancelToken, CoreError, DeployConfig, Session, Sleeper};
use berth_host::{CommandRunner, ContainerEngine, HostError, HostIdentity, PlanOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_HOST_ERROR: u8 = 3;
pub const EXIT_ENGINE_UNAVAILABLE: u8 = 4;

const ENGINE_UNAVAILABLE: &str = "engine unavailable:";

/// Process-wide collaborators every session borrows.
pub struct Host<'a> {
    pub runner: &'a dyn CommandRunner,
    pub identity: &'a dyn HostIdentity,
    pub sleeper: &'a dyn Sleeper,
    pub cancel: CancelToken,
}

/// Where the deploy configuration comes from, plus command-line overrides.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub explicit: bool,
    pub engine: Option<ContainerEngine>,
    pub compose_file: Option<PathBuf>,
}

impl ConfigSource {
    pub fn load(&self) -> Result<DeployConfig, String> {
        let mut config =
            DeployConfig::load_or_default(&self.path, self.explicit).map_err(|e| describe(&e))?;
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(file) = &self.compose_file {
            if file.as_os_str().is_empty() {
                return Err("config error: --compose-file must not be empty".to_owned());
            }
            config.compose_file.clone_from(file);
        }
        Ok(config)
    }
}

/// Explicit flag, then the user who invoked sudo, then the plan default.
pub fn admin_user_or_default(flag: Option<String>) -> String {
    let sudo_user = || {
        std::env::var("SUDO_USER")
            .ok()
            .filter(|u| !u.is_empty() && u != "root")
    };
    flag.or_else(sudo_user)
        .unwrap_or_else(|| PlanOptions::default().admin_user)
}

/// Load the configuration and hand a ready session to `f`.
pub fn with_session<T>(
    source: &ConfigSource,
    host: &Host<'_>,
    f: impl FnOnce(&Session<'_>, &DeployConfig) -> Result<T, String>,
) -> Result<T, String> {
    let config = source.load()?;
    let session = Session::new(&config, host.runner, host.identity, host.sleeper)
        .with_cancel(host.cancel.clone());
    f(&session, &config)
}

/// Render an error so that `exit_code_for` can classify it.
pub fn describe(err: &CoreError) -> String {
    match err {
        CoreError::EngineNotInstalled(_)
        | CoreError::DaemonNotRunning
        | CoreError::Permission { .. }
        | CoreError::DialectResolution => format!("{ENGINE_UNAVAILABLE} {err}"),
        _ => err.to_string(),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn describe_host(err: HostError) -> String {
    describe(&CoreError::from(err))
}

pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("config error:") || msg.starts_with("failed to parse config") {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("host error:") {
        EXIT_HOST_ERROR
    } else if msg.starts_with(ENGINE_UNAVAILABLE) {
        EXIT_ENGINE_UNAVAILABLE
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "pass" | "running" => Style::new().green().apply_to(status).to_string(),
        "fail" => Style::new().red().bold().apply_to(status).to_string(),
        "warn" => Style::new().yellow().apply_to(status).to_string(),
        "info" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}
