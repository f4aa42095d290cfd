use super::{describe, json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use berth_core::{Provisioned, Session};
use berth_host::{DistroDetector, PlanOptions, ServiceStart};

pub fn run(session: &Session<'_>, admin_user: String, json: bool) -> Result<u8, String> {
    let engine = session.engine();
    let pb = spinner(&format!("provisioning {engine}…"));
    let outcome = session
        .ensure_installed(&DistroDetector::new(), &PlanOptions { admin_user })
        .map_err(|e| {
            spin_fail(&pb, "provisioning failed");
            describe(&e)
        })?;

    match &outcome {
        Provisioned::AlreadyInstalled => spin_ok(&pb, &format!("{engine} is already installed")),
        Provisioned::Installed { plan, .. } => {
            spin_ok(&pb, &format!("installed {engine} ({} steps)", plan.len()));
        }
    }

    if json {
        let payload = match &outcome {
            Provisioned::AlreadyInstalled => serde_json::json!({
                "engine": engine,
                "installed": false,
                "already_present": true,
            }),
            Provisioned::Installed { plan, service } => serde_json::json!({
                "engine": engine,
                "installed": true,
                "already_present": false,
                "plan": plan,
                "service": match service {
                    ServiceStart::Started => "started".to_owned(),
                    ServiceStart::Manual(note) => note.clone(),
                },
            }),
        };
        println!("{}", json_pretty(&payload)?);
    } else if let Provisioned::Installed { service, .. } = &outcome {
        match service {
            ServiceStart::Started => println!("{engine} service enabled and started"),
            ServiceStart::Manual(note) => println!("{note}"),
        }
    }
    Ok(EXIT_SUCCESS)
}
