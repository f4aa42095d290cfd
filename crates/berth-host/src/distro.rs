use crate::command::{CommandRunner, CommandSpec};
use crate::HostError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Operating system the binary is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Linux,
    MacOs,
    Other,
}

impl HostPlatform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::MacOs => f.write_str("macos"),
            Self::Other => f.write_str(std::env::consts::OS),
        }
    }
}

/// Distribution families with a known Docker install sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistroFamily {
    #[serde(rename = "ubuntu")]
    Ubuntu,
    #[serde(rename = "debian")]
    Debian,
    #[serde(rename = "fedora")]
    Fedora,
    #[serde(rename = "opensuse")]
    OpenSuse,
    #[serde(rename = "rhel")]
    Rhel,
    #[serde(rename = "amzn")]
    Amazon,
}

impl DistroFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::OpenSuse => "opensuse",
            Self::Rhel => "rhel",
            Self::Amazon => "amzn",
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture in Docker's repository naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Map a raw `uname -m` value. Only x86_64 and aarch64 are representable.
    pub fn from_raw(raw: &str) -> Result<Self, HostError> {
        match raw.trim() {
            "x86_64" => Ok(Self::Amd64),
            "aarch64" => Ok(Self::Arm64),
            other => Err(HostError::UnsupportedArchitecture(other.to_owned())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroProfile {
    pub family: DistroFamily,
    /// Raw `ID` value from os-release.
    pub id: String,
    /// Only populated for Fedora, where it selects the DNF generation.
    pub version_id: Option<u32>,
    pub codename: Option<String>,
    pub arch: Arch,
}

enum IdPattern {
    Exact(&'static str),
    Prefix(&'static str),
}

impl IdPattern {
    fn matches(&self, id: &str) -> bool {
        match self {
            Self::Exact(want) => id == *want,
            Self::Prefix(prefix) => id.starts_with(prefix),
        }
    }
}

const FAMILY_TABLE: &[(IdPattern, DistroFamily)] = &[
    (IdPattern::Exact("ubuntu"), DistroFamily::Ubuntu),
    (IdPattern::Exact("debian"), DistroFamily::Debian),
    (IdPattern::Exact("fedora"), DistroFamily::Fedora),
    (IdPattern::Prefix("opensuse"), DistroFamily::OpenSuse),
    (IdPattern::Prefix("rhel"), DistroFamily::Rhel),
    (IdPattern::Exact("amzn"), DistroFamily::Amazon),
];

pub fn family_for_id(id: &str) -> Option<DistroFamily> {
    FAMILY_TABLE
        .iter()
        .find(|(pattern, _)| pattern.matches(id))
        .map(|(_, family)| *family)
}

/// Parse os-release text into key/value pairs with surrounding quotes removed.
pub fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.trim().to_owned(), value.to_owned());
        }
    }
    vars
}

/// Build a profile from os-release text and a raw architecture string.
///
/// Architecture is checked first, so an unsupported CPU is reported even on an
/// unsupported distribution.
pub fn detect_from(os_release: &str, raw_arch: &str) -> Result<DistroProfile, HostError> {
    let arch = Arch::from_raw(raw_arch)?;
    let vars = parse_os_release(os_release);

    let id = vars.get("ID").map(String::as_str).unwrap_or_default();
    let family = family_for_id(id).ok_or_else(|| {
        HostError::UnsupportedDistribution(if id.is_empty() {
            "<missing ID>".to_owned()
        } else {
            id.to_owned()
        })
    })?;

    let version_id = if family == DistroFamily::Fedora {
        vars.get("VERSION_ID").and_then(|v| v.trim().parse::<u32>().ok())
    } else {
        None
    };

    let codename = vars
        .get("VERSION_CODENAME")
        .or_else(|| vars.get("UBUNTU_CODENAME"))
        .filter(|c| !c.is_empty())
        .cloned();

    Ok(DistroProfile {
        family,
        id: id.to_owned(),
        version_id,
        codename,
        arch,
    })
}

/// Reads the host's os-release file and `uname -m`.
pub struct DistroDetector {
    os_release_path: PathBuf,
}

impl Default for DistroDetector {
    fn default() -> Self {
        Self {
            os_release_path: PathBuf::from(OS_RELEASE_PATH),
        }
    }
}

impl DistroDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_os_release(path: impl Into<PathBuf>) -> Self {
        Self {
            os_release_path: path.into(),
        }
    }

    pub fn os_release_path(&self) -> &Path {
        &self.os_release_path
    }

    pub fn read_os_release(&self) -> Result<String, HostError> {
        std::fs::read_to_string(&self.os_release_path).map_err(|source| HostError::OsRelease {
            path: self.os_release_path.display().to_string(),
            source,
        })
    }

    pub fn raw_arch(runner: &dyn CommandRunner) -> Result<String, HostError> {
        let output = runner
            .run(&CommandSpec::new("uname").arg("-m"))
            .map_err(|e| HostError::ExecFailed(format!("uname -m: {e}")))?;
        if !output.success {
            return Err(HostError::ExecFailed(format!(
                "uname -m: {}",
                output.status_description()
            )));
        }
        Ok(output.stdout_text().trim().to_owned())
    }

    pub fn detect(&self, runner: &dyn CommandRunner) -> Result<DistroProfile, HostError> {
        let os_release = self.read_os_release()?;
        let raw_arch = Self::raw_arch(runner)?;
        let profile = detect_from(&os_release, &raw_arch)?;
        tracing::debug!(
            "detected {} ({}) on {}",
            profile.family,
            profile.id,
            profile.arch
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Reply, ScriptedRunner};

    const UBUNTU: &str = r#"
PRETTY_NAME="Ubuntu 24.04.1 LTS"
NAME="Ubuntu"
VERSION_ID="24.04"
VERSION_CODENAME=noble
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=noble
"#;

    const FEDORA_41: &str = r#"
NAME="Fedora Linux"
VERSION="41 (Workstation Edition)"
ID=fedora
VERSION_ID=41
"#;

    #[test]
    fn arch_table_is_exact() {
        assert_eq!(Arch::from_raw("x86_64").unwrap(), Arch::Amd64);
        assert_eq!(Arch::from_raw("aarch64").unwrap(), Arch::Arm64);
        assert_eq!(Arch::Amd64.as_str(), "amd64");
        assert_eq!(Arch::Arm64.as_str(), "arm64");
    }

    #[test]
    fn every_other_arch_is_unsupported() {
        for raw in [
            "armv7l", "i686", "riscv64", "ppc64le", "s390x", "amd64", "arm64", "", "X86_64",
        ] {
            assert!(
                matches!(
                    detect_from(UBUNTU, raw),
                    Err(HostError::UnsupportedArchitecture(_))
                ),
                "{raw} must be rejected"
            );
        }
    }

    #[test]
    fn arch_error_wins_over_distro_error() {
        let err = detect_from("ID=gentoo\n", "i686").unwrap_err();
        assert!(matches!(err, HostError::UnsupportedArchitecture(a) if a == "i686"));
    }

    #[test]
    fn parse_strips_quotes_and_comments() {
        let vars = parse_os_release("# comment\nNAME=\"Debian GNU/Linux\"\nID='debian'\n\n");
        assert_eq!(vars.get("NAME").unwrap(), "Debian GNU/Linux");
        assert_eq!(vars.get("ID").unwrap(), "debian");
        assert!(!vars.contains_key("# comment"));
    }

    #[test]
    fn ubuntu_profile() {
        let p = detect_from(UBUNTU, "x86_64").unwrap();
        assert_eq!(p.family, DistroFamily::Ubuntu);
        assert_eq!(p.arch, Arch::Amd64);
        assert_eq!(p.codename.as_deref(), Some("noble"));
        assert_eq!(p.version_id, None, "version is only kept for fedora");
    }

    #[test]
    fn fedora_version_is_parsed() {
        let p = detect_from(FEDORA_41, "aarch64").unwrap();
        assert_eq!(p.family, DistroFamily::Fedora);
        assert_eq!(p.version_id, Some(41));
        assert_eq!(p.arch, Arch::Arm64);
    }

    #[test]
    fn fedora_unparseable_version_is_unset() {
        let p = detect_from("ID=fedora\nVERSION_ID=rawhide\n", "x86_64").unwrap();
        assert_eq!(p.version_id, None);
    }

    #[test]
    fn family_table_prefixes() {
        assert_eq!(family_for_id("opensuse-leap"), Some(DistroFamily::OpenSuse));
        assert_eq!(family_for_id("opensuse-tumbleweed"), Some(DistroFamily::OpenSuse));
        assert_eq!(family_for_id("rhel"), Some(DistroFamily::Rhel));
        assert_eq!(family_for_id("amzn"), Some(DistroFamily::Amazon));
        assert_eq!(family_for_id("ubuntu-core"), None);
        assert_eq!(family_for_id("arch"), None);
    }

    #[test]
    fn quoted_ids_match() {
        let p = detect_from("ID=\"opensuse-leap\"\nVERSION_ID=\"15.6\"\n", "x86_64").unwrap();
        assert_eq!(p.family, DistroFamily::OpenSuse);
        let p = detect_from("ID=\"rhel\"\nVERSION_ID=\"9.4\"\n", "x86_64").unwrap();
        assert_eq!(p.family, DistroFamily::Rhel);
    }

    #[test]
    fn unknown_distribution_names_id() {
        let err = detect_from("ID=arch\n", "x86_64").unwrap_err();
        assert!(matches!(err, HostError::UnsupportedDistribution(id) if id == "arch"));
        let err = detect_from("NAME=nothing\n", "x86_64").unwrap_err();
        assert!(matches!(err, HostError::UnsupportedDistribution(_)));
    }

    #[test]
    fn detector_reads_file_and_uname() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, FEDORA_41).unwrap();

        let runner = ScriptedRunner::new().on("uname -m", Reply::ok("x86_64\n"));
        let profile = DistroDetector::with_os_release(&path).detect(&runner).unwrap();
        assert_eq!(profile.family, DistroFamily::Fedora);
        assert_eq!(profile.arch, Arch::Amd64);
    }

    #[test]
    fn detector_missing_file_names_path() {
        let runner = ScriptedRunner::new().on("uname -m", Reply::ok("x86_64\n"));
        let err = DistroDetector::with_os_release("/nonexistent/os-release")
            .detect(&runner)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/os-release"));
    }
}
