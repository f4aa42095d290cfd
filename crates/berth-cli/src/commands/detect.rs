use super::{describe_host, json_pretty, EXIT_SUCCESS};
use berth_host::{detect_from, CommandRunner, DistroDetector, DistroProfile, HostError};
use std::path::Path;

/// Detect the host profile, optionally from a given os-release file and raw
/// machine name instead of the live system.
pub fn resolve_profile(
    runner: &dyn CommandRunner,
    os_release: Option<&Path>,
    arch: Option<&str>,
) -> Result<DistroProfile, HostError> {
    let detector = os_release.map_or_else(DistroDetector::new, DistroDetector::with_os_release);
    match arch {
        Some(raw) => detect_from(&detector.read_os_release()?, raw),
        None => detector.detect(runner),
    }
}

pub fn run(
    runner: &dyn CommandRunner,
    os_release: Option<&Path>,
    arch: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let profile = resolve_profile(runner, os_release, arch).map_err(describe_host)?;

    if json {
        println!("{}", json_pretty(&profile)?);
    } else {
        println!("family:   {}", profile.family);
        println!("id:       {}", profile.id);
        if let Some(version) = profile.version_id {
            println!("version:  {version}");
        }
        if let Some(codename) = &profile.codename {
            println!("codename: {codename}");
        }
        println!("arch:     {}", profile.arch);
    }
    Ok(EXIT_SUCCESS)
}
