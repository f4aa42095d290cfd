use crate::command::CommandSpec;
use crate::distro::{DistroFamily, DistroProfile};
use crate::engine::ContainerEngine;
use crate::HostError;
use serde::Serialize;
use std::fmt;

pub const DOCKER_DOWNLOAD_BASE: &str = "https://download.docker.com/linux";
pub const APT_KEYRING: &str = "/usr/share/keyrings/docker-archive-keyring.gpg";
pub const APT_SOURCE_LIST: &str = "/etc/apt/sources.list.d/docker.list";

/// First Fedora release shipping DNF 5, whose `config-manager` syntax differs.
pub const DNF5_FIRST_FEDORA: u32 = 41;

const DOCKER_CE_PACKAGES: [&str; 4] = [
    "docker-ce",
    "docker-ce-cli",
    "containerd.io",
    "docker-compose-plugin",
];

const APT_PREREQUISITES: [&str; 4] = [
    "apt-transport-https",
    "ca-certificates",
    "curl",
    "software-properties-common",
];

/// One privileged action in an install plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallStep {
    Run { command: CommandSpec },
    /// Download an armored signing key and store it dearmored in a keyring.
    ImportKey { url: String, keyring: String },
    WriteFile { path: String, contents: String },
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run { command } => write!(f, "{command}"),
            Self::ImportKey { url, keyring } => {
                write!(f, "curl -fsSL {url} | gpg --dearmor -o {keyring}")
            }
            Self::WriteFile { path, contents } => {
                write!(f, "echo '{}' > {path}", contents.trim_end())
            }
        }
    }
}

/// Ordered, fully parameterized steps that install an engine on one host.
///
/// A plan is not idempotent: executing it a second time can fail on steps that
/// register repositories or keyrings which already exist. Callers should check
/// `EngineProbe::is_engine_installed` before planning rather than re-running a
/// plan after a partial failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    pub engine: ContainerEngine,
    pub family: DistroFamily,
    pub steps: Vec<InstallStep>,
}

impl InstallPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Rendered steps, one per line, for display and assertions.
    pub fn lines(&self) -> Vec<String> {
        self.steps.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "install {} on {}:", self.engine, self.family)?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {:>2}. {step}", i + 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// User added to the docker group on Amazon Linux.
    pub admin_user: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            admin_user: "ec2-user".to_owned(),
        }
    }
}

fn run(program: &str, args: &[&str]) -> InstallStep {
    InstallStep::Run {
        command: CommandSpec::new(program).args(args.iter().copied()),
    }
}

fn install_docker_ce(program: &str) -> InstallStep {
    let mut args = vec!["install", "-y"];
    args.extend(DOCKER_CE_PACKAGES);
    run(program, &args)
}

/// Map a distro profile to the Docker install sequence for it.
pub fn plan(profile: &DistroProfile, options: &PlanOptions) -> Result<InstallPlan, HostError> {
    plan_for(ContainerEngine::Docker, profile, options)
}

pub fn plan_for(
    engine: ContainerEngine,
    profile: &DistroProfile,
    options: &PlanOptions,
) -> Result<InstallPlan, HostError> {
    if engine != ContainerEngine::Docker {
        return Err(HostError::NoInstallPlan(engine));
    }

    let steps = match profile.family {
        DistroFamily::Ubuntu | DistroFamily::Debian => apt_steps(profile)?,
        DistroFamily::Fedora => fedora_steps(profile.version_id),
        DistroFamily::OpenSuse => vec![
            run("zypper", &["install", "-y", "docker", "docker-compose"]),
            run("systemctl", &["enable", "docker"]),
        ],
        DistroFamily::Rhel => vec![
            run("dnf", &["remove", "-y", "runc"]),
            run("dnf", &["-y", "install", "yum-utils"]),
            run(
                "dnf",
                &[
                    "config-manager",
                    "--add-repo",
                    &format!("{DOCKER_DOWNLOAD_BASE}/rhel/docker-ce.repo"),
                ],
            ),
            install_docker_ce("dnf"),
            run("systemctl", &["enable", "docker"]),
        ],
        DistroFamily::Amazon => vec![
            run("yum", &["update", "-y"]),
            run("yum", &["install", "-y", "docker"]),
            run("systemctl", &["enable", "docker"]),
            run("usermod", &["-a", "-G", "docker", &options.admin_user]),
        ],
    };

    Ok(InstallPlan {
        engine,
        family: profile.family,
        steps,
    })
}

fn apt_steps(profile: &DistroProfile) -> Result<Vec<InstallStep>, HostError> {
    let family = profile.family.as_str();
    let codename = profile
        .codename
        .as_deref()
        .ok_or_else(|| HostError::MissingCodename {
            family: family.to_owned(),
        })?;

    let mut prereqs = vec!["install", "-y"];
    prereqs.extend(APT_PREREQUISITES);

    Ok(vec![
        run("apt-get", &["update"]),
        run("apt-get", &prereqs),
        InstallStep::ImportKey {
            url: format!("{DOCKER_DOWNLOAD_BASE}/{family}/gpg"),
            keyring: APT_KEYRING.to_owned(),
        },
        InstallStep::WriteFile {
            path: APT_SOURCE_LIST.to_owned(),
            contents: format!(
                "deb [arch={} signed-by={APT_KEYRING}] {DOCKER_DOWNLOAD_BASE}/{family} {codename} stable\n",
                profile.arch
            ),
        },
        run("apt-get", &["update"]),
        install_docker_ce("apt-get"),
    ])
}

fn fedora_steps(version_id: Option<u32>) -> Vec<InstallStep> {
    let repo = format!("{DOCKER_DOWNLOAD_BASE}/fedora/docker-ce.repo");
    let add_repo = if version_id.is_some_and(|v| v >= DNF5_FIRST_FEDORA) {
        run(
            "dnf",
            &["config-manager", "addrepo", &format!("--from-repofile={repo}")],
        )
    } else {
        run("dnf", &["config-manager", "--add-repo", &repo])
    };

    vec![
        run("dnf", &["-y", "install", "dnf-plugins-core"]),
        add_repo,
        install_docker_ce("dnf"),
    ]
}
