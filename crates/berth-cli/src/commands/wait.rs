use super::{describe, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use berth_core::{ContainerRunState, Session};
use std::time::Duration;

pub fn run(
    session: &Session<'_>,
    container: &str,
    attempts: Option<u32>,
    interval: Option<u64>,
    json: bool,
) -> Result<u8, String> {
    let mut waiter = session.waiter();
    if let Some(attempts) = attempts {
        waiter = waiter.with_attempts(attempts);
    }
    if let Some(secs) = interval {
        waiter = waiter.with_interval(Duration::from_secs(secs));
    }

    let pb = spinner(&format!("waiting for {container}…"));
    let result = waiter.wait_with(session.engine(), container, |attempt, state| {
        let seen = match state {
            ContainerRunState::Running => "running",
            ContainerRunState::NotRunning => "not running yet",
            ContainerRunState::Indeterminate => "not found yet",
        };
        pb.set_message(format!("waiting for {container}… attempt {attempt}: {seen}"));
    });
    let used = result.map_err(|e| {
        spin_fail(&pb, &format!("{container} did not start"));
        describe(&e)
    })?;
    spin_ok(&pb, &format!("{container} is running"));

    if json {
        let payload = serde_json::json!({
            "container": container,
            "engine": session.engine(),
            "attempts": used,
        });
        println!("{}", json_pretty(&payload)?);
    }
    Ok(EXIT_SUCCESS)
}
