use crate::HostError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The container runtime product driving the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEngine {
    Docker,
    Podman,
}

impl ContainerEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Engine CLI binary, also used for `container inspect`.
    pub fn binary(self) -> &'static str {
        self.as_str()
    }

    /// Group whose members may talk to the engine daemon without root.
    /// Podman is daemonless and has no such group.
    pub fn admin_group(self) -> Option<&'static str> {
        match self {
            Self::Docker => Some("docker"),
            Self::Podman => None,
        }
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerEngine {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(HostError::UnknownEngine(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Docker".parse::<ContainerEngine>().unwrap(), ContainerEngine::Docker);
        assert_eq!(" podman ".parse::<ContainerEngine>().unwrap(), ContainerEngine::Podman);
    }

    #[test]
    fn parse_rejects_unknown_engine() {
        let err = "containerd".parse::<ContainerEngine>().unwrap_err();
        assert!(err.to_string().contains("containerd"));
    }

    #[test]
    fn only_docker_has_admin_group() {
        assert_eq!(ContainerEngine::Docker.admin_group(), Some("docker"));
        assert_eq!(ContainerEngine::Podman.admin_group(), None);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ContainerEngine::Podman).unwrap();
        assert_eq!(json, "\"podman\"");
    }
}
