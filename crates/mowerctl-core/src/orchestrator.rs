use crate::credential::{Credential, Deployment};
use crate::supervisor::Supervisor;
use crate::CoreError;
use mowerctl_runtime::RuntimeInstance;
use tracing::info;

/// Result of a full re-entry.
#[derive(Debug, Clone)]
pub struct Reentry {
    pub deployment: Deployment,
    pub removed: usize,
    pub launched: Vec<RuntimeInstance>,
}

/// Relaunch this host's deployment from scratch.
///
/// The deployment comes from the credential file. Every prior managed
/// instance is stopped and removed before the first launch. Scratch is purged
/// and the rosters written once; for a robot the autopilot and
/// obstacle-detector instances then share those grants and launch in order.
pub fn reenter(supervisor: &Supervisor<'_>, progress: &dyn Fn(&str)) -> Result<Reentry, CoreError> {
    supervisor.check_preconditions()?;
    let credential = Credential::load(&supervisor.config().credential_file)?;
    let deployment = credential.deployment()?;
    info!("re-entering as {deployment}");

    supervisor.prepare_host();
    let removed = supervisor.reset_all(progress)?;

    let devices = supervisor.prepare_launch()?;
    let mut launched = Vec::new();
    for role in deployment.roles() {
        progress(&format!("launching {role}"));
        launched.push(supervisor.launch_with(*role, devices.clone())?);
    }

    Ok(Reentry {
        deployment,
        removed,
        launched,
    })
}
