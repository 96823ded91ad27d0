use crate::backend::{ContainerRuntime, RuntimeInstance};
use crate::spec::{LaunchSpec, Role};
use crate::RuntimeError;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// In-memory runtime for tests and dry runs.
pub struct MockRuntime {
    instances: Mutex<Vec<RuntimeInstance>>,
    launches: Mutex<Vec<LaunchSpec>>,
    next_id: AtomicU32,
    fail_launch: Option<i32>,
    log_command: Vec<String>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            instances: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
            fail_launch: None,
            log_command: vec!["true".to_owned()],
        }
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every launch fail with the given native exit code.
    #[must_use]
    pub fn failing_launch(mut self, code: i32) -> Self {
        self.fail_launch = Some(code);
        self
    }

    /// Program spawned for each log follower instead of `true`.
    #[must_use]
    pub fn with_log_command(mut self, command: &[&str]) -> Self {
        self.log_command = command.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    /// Pre-populate an instance, as if left over from an earlier run.
    pub fn seed(&self, image: &str, role: Option<Role>, running: bool) -> String {
        let id = format!("mock{:08}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_instances().push(RuntimeInstance {
            id: id.clone(),
            image: image.to_owned(),
            role,
            running,
        });
        id
    }

    pub fn instances(&self) -> Vec<RuntimeInstance> {
        self.lock_instances().clone()
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.launches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn lock_instances(&self) -> std::sync::MutexGuard<'_, Vec<RuntimeInstance>> {
        self.instances
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn list(
        &self,
        family: &str,
        include_stopped: bool,
    ) -> Result<Vec<RuntimeInstance>, RuntimeError> {
        Ok(self
            .lock_instances()
            .iter()
            .filter(|i| i.is_managed(family))
            .filter(|i| include_stopped || i.running)
            .cloned()
            .collect())
    }

    fn stop(&self, id: &str, _timeout_secs: u32) -> Result<(), RuntimeError> {
        let mut instances = self.lock_instances();
        let inst = instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))?;
        inst.running = false;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        let mut instances = self.lock_instances();
        let before = instances.len();
        instances.retain(|i| i.id != id);
        if instances.len() == before {
            return Err(RuntimeError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeInstance, RuntimeError> {
        if let Some(code) = self.fail_launch {
            return Err(RuntimeError::CommandFailed {
                command: "mock run".to_owned(),
                code,
                stderr: "simulated launch failure".to_owned(),
            });
        }
        self.launches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(spec.clone());
        let id = self.seed(&spec.image, Some(spec.role), true);
        Ok(RuntimeInstance {
            id,
            image: spec.image.clone(),
            role: Some(spec.role),
            running: true,
        })
    }

    fn follow_logs(&self, id: &str, _tail: usize) -> Result<Child, RuntimeError> {
        if !self.lock_instances().iter().any(|i| i.id == id) {
            return Err(RuntimeError::NotFound(id.to_owned()));
        }
        let (program, args) = self
            .log_command
            .split_first()
            .ok_or_else(|| RuntimeError::Unavailable("empty log command".to_owned()))?;
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(RuntimeError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PortMapping;
    use std::path::PathBuf;

    const FAMILY: &str = "oxchief/oxchief-client";

    fn spec(role: Role) -> LaunchSpec {
        LaunchSpec {
            image: FAMILY.to_owned(),
            role,
            env_file: PathBuf::from("oxchief.env"),
            mounts: Vec::new(),
            devices: Vec::new(),
            port: PortMapping::same(8080),
        }
    }

    #[test]
    fn mock_lifecycle() {
        let rt = MockRuntime::new();
        let inst = rt.launch(&spec(Role::Base)).unwrap();
        assert_eq!(rt.list(FAMILY, false).unwrap().len(), 1);

        rt.stop(&inst.id, 10).unwrap();
        assert!(rt.list(FAMILY, false).unwrap().is_empty());
        assert_eq!(rt.list(FAMILY, true).unwrap().len(), 1);

        rt.remove(&inst.id).unwrap();
        assert!(rt.list(FAMILY, true).unwrap().is_empty());
        assert!(rt.remove(&inst.id).is_err());
    }

    #[test]
    fn list_respects_family() {
        let rt = MockRuntime::new();
        rt.seed("redis:7", None, true);
        rt.seed(FAMILY, Some(Role::Autopilot), true);
        assert_eq!(rt.list(FAMILY, true).unwrap().len(), 1);
    }

    #[test]
    fn list_keeps_instances_from_superseded_images() {
        let rt = MockRuntime::new();
        rt.seed("3f2a1b9c8d7e", Some(Role::Obstacle), false);
        assert_eq!(rt.list(FAMILY, true).unwrap().len(), 1);
        assert!(rt.list(FAMILY, false).unwrap().is_empty());
    }

    #[test]
    fn failing_launch_reports_code() {
        let rt = MockRuntime::new().failing_launch(125);
        let err = rt.launch(&spec(Role::Autopilot)).unwrap_err();
        assert_eq!(err.native_code(), Some(125));
        assert!(rt.launches().is_empty());
    }

    #[test]
    fn follow_logs_requires_known_instance() {
        let rt = MockRuntime::new();
        assert!(rt.follow_logs("nope", 100).is_err());
        let id = rt.seed(FAMILY, Some(Role::Base), true);
        let mut child = rt.follow_logs(&id, 100).unwrap();
        assert!(child.wait().unwrap().success());
    }
}
