use super::{colorize_status, describe, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use berth_core::{DeployConfig, LifecycleOperation, ReadyContainer, Session};

fn past_tense(operation: &LifecycleOperation) -> &'static str {
    match operation {
        LifecycleOperation::Pull => "pulled images",
        LifecycleOperation::Start => "started services",
        LifecycleOperation::Stop => "stopped services",
        LifecycleOperation::Restart(_) => "restarted services",
    }
}

pub fn run(
    session: &Session<'_>,
    operation: &LifecycleOperation,
    wait: bool,
    json: bool,
) -> Result<u8, String> {
    session.preflight().map_err(|e| describe(&e))?;

    let engine = session.engine();
    let pb = spinner(&format!("{operation} ({engine})…"));
    let ready = session.run(operation, wait).map_err(|e| {
        spin_fail(&pb, &format!("{operation} failed"));
        describe(&e)
    })?;
    spin_ok(&pb, past_tense(operation));

    report(session, operation.name(), &ready, json)
}

/// Preflight, pull, start, and wait for every configured container.
pub fn up(session: &Session<'_>, config: &DeployConfig, json: bool) -> Result<u8, String> {
    let pb = spinner(&format!(
        "deploying {} with {}…",
        session.compose_file().display(),
        session.engine()
    ));
    if !config.readiness.containers.is_empty() {
        pb.set_message(format!(
            "deploying and waiting for {}…",
            config.readiness.containers.join(", ")
        ));
    }
    let ready = session.deploy().map_err(|e| {
        spin_fail(&pb, "deploy failed");
        describe(&e)
    })?;
    spin_ok(&pb, "deployment is up");

    report(session, "up", &ready, json)
}

fn report(
    session: &Session<'_>,
    operation: &str,
    ready: &[ReadyContainer],
    json: bool,
) -> Result<u8, String> {
    if json {
        let payload = serde_json::json!({
            "operation": operation,
            "engine": session.engine(),
            "compose_file": session.compose_file(),
            "dialect": session.dialect(),
            "ready": ready.iter().map(|r| serde_json::json!({
                "name": r.name,
                "attempts": r.attempts,
            })).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for container in ready {
            println!(
                "  {} {} (attempt {})",
                container.name,
                colorize_status("running"),
                container.attempts
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
