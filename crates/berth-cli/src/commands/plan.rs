use super::detect::resolve_profile;
use super::{describe_host, json_pretty, ConfigSource, EXIT_SUCCESS};
use berth_host::plan::plan_for;
use berth_host::{CommandRunner, PlanOptions};
use std::path::Path;

pub fn run(
    runner: &dyn CommandRunner,
    source: &ConfigSource,
    os_release: Option<&Path>,
    arch: Option<&str>,
    admin_user: String,
    json: bool,
) -> Result<u8, String> {
    let engine = source.load()?.engine;
    let profile = resolve_profile(runner, os_release, arch).map_err(describe_host)?;
    let plan = plan_for(engine, &profile, &PlanOptions { admin_user }).map_err(describe_host)?;

    if json {
        println!("{}", json_pretty(&plan)?);
    } else {
        println!(
            "install plan for {} on {} ({}), {} steps:",
            plan.engine,
            plan.family,
            profile.arch,
            plan.len()
        );
        for (index, line) in plan.lines().iter().enumerate() {
            println!("  {:>2}. {line}", index + 1);
        }
    }
    Ok(EXIT_SUCCESS)
}
