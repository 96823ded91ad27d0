use crate::backend::{ContainerRuntime, RuntimeInstance};
use crate::spec::{LaunchSpec, Role, ROLE_LABEL};
use crate::RuntimeError;
use std::process::{Child, Command, Output, Stdio};
use tracing::{debug, info};

/// `ContainerRuntime` driving the `docker` command line client.
///
/// Failures are passed through with the client's own exit code and stderr;
/// nothing is retried at this layer.
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
        }
    }
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_owned(),
        }
    }

    fn run(&self, args: &[String]) -> Result<Output, RuntimeError> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::Unavailable(self.binary.clone())
                } else {
                    RuntimeError::Io(e)
                }
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            let verb = args.first().map_or("", String::as_str);
            Err(RuntimeError::CommandFailed {
                command: format!("{} {verb}", self.binary),
                code: output.status.code().unwrap_or(1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

/// Tab-separated id, image, state, and role label (see `ROLE_LABEL`).
const PS_FORMAT: &str = "{{.ID}}\t{{.Image}}\t{{.State}}\t{{.Label \"mowerctl.role\"}}";

/// Argument vectors for the `ps` queries that together cover the family.
///
/// Filters of different keys are ANDed by the client, so the family is
/// listed twice: once by ancestry, which also catches instances whose image
/// shows as a bare ID after a re-pull, and once by role label.
pub fn ps_queries(family: &str, include_stopped: bool) -> [Vec<String>; 2] {
    let query = |filter: String| {
        let mut args = vec!["ps".to_owned(), "--no-trunc".to_owned()];
        if include_stopped {
            args.push("-a".to_owned());
        }
        args.extend([
            "--filter".to_owned(),
            filter,
            "--format".to_owned(),
            PS_FORMAT.to_owned(),
        ]);
        args
    };
    [
        query(format!("ancestor={family}")),
        query(format!("label={ROLE_LABEL}")),
    ]
}

/// Parse `ps --format` output produced with [`PS_FORMAT`], keeping only
/// instances of the image family.
pub fn parse_ps_output(stdout: &str, family: &str) -> Vec<RuntimeInstance> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let id = fields.next()?.trim();
            let image = fields.next()?.trim();
            let state = fields.next().unwrap_or("").trim();
            let role = fields.next().and_then(|r| r.trim().parse::<Role>().ok());
            if id.is_empty() {
                return None;
            }
            let inst = RuntimeInstance {
                id: id.to_owned(),
                image: image.to_owned(),
                role,
                running: state == "running",
            };
            inst.is_managed(family).then_some(inst)
        })
        .collect()
}

impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn list(
        &self,
        family: &str,
        include_stopped: bool,
    ) -> Result<Vec<RuntimeInstance>, RuntimeError> {
        let mut instances: Vec<RuntimeInstance> = Vec::new();
        for args in ps_queries(family, include_stopped) {
            let output = self.run(&args)?;
            for inst in parse_ps_output(&String::from_utf8_lossy(&output.stdout), family) {
                if !instances.iter().any(|known| known.id == inst.id) {
                    instances.push(inst);
                }
            }
        }
        Ok(instances)
    }

    fn stop(&self, id: &str, timeout_secs: u32) -> Result<(), RuntimeError> {
        self.run(&[
            "stop".to_owned(),
            "-t".to_owned(),
            timeout_secs.to_string(),
            id.to_owned(),
        ])?;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["rm".to_owned(), id.to_owned()])?;
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeInstance, RuntimeError> {
        let mut args = vec!["run".to_owned()];
        args.extend(spec.run_args());
        let output = self.run(&args)?;

        let id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        info!(
            "launched {} instance {} ({} device grants)",
            spec.role,
            &id[..12.min(id.len())],
            spec.devices.len()
        );
        Ok(RuntimeInstance {
            id,
            image: spec.image.clone(),
            role: Some(spec.role),
            running: true,
        })
    }

    fn follow_logs(&self, id: &str, tail: usize) -> Result<Child, RuntimeError> {
        Command::new(&self.binary)
            .args(["logs", "--follow", "--tail", &tail.to_string(), id])
            .stdin(Stdio::null())
            .spawn()
            .map_err(RuntimeError::Io)
    }
}
