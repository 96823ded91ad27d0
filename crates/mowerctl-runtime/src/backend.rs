use crate::spec::{LaunchSpec, Role};
use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::process::Child;

/// One managed container as reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeInstance {
    pub id: String,
    pub image: String,
    /// `None` for instances started before role labelling, or by hand.
    pub role: Option<Role>,
    pub running: bool,
}

impl RuntimeInstance {
    /// Whether this instance belongs to the managed family `family`.
    pub fn is_managed(&self, family: &str) -> bool {
        self.role.is_some() || image_matches(&self.image, family) || is_image_id(&self.image)
    }

    pub fn short_id(&self) -> &str {
        &self.id[..12.min(self.id.len())]
    }
}

/// Whether `image` belongs to the managed image family `family`.
///
/// Matches the bare name and any tag or digest of it.
pub fn image_matches(image: &str, family: &str) -> bool {
    image == family
        || image
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with(':') || rest.starts_with('@'))
}

/// Whether `image` is a bare image ID rather than a repository reference.
/// Runtimes report an instance's image this way once its tag has moved to a
/// newer pull.
pub fn is_image_id(image: &str) -> bool {
    let hex = image.strip_prefix("sha256:").unwrap_or(image);
    hex.len() >= 12 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Instances of the image family, including ones whose image now shows
    /// as a bare ID and any carrying the role label. Stopped ones are
    /// included when `include_stopped` is set.
    fn list(&self, family: &str, include_stopped: bool)
        -> Result<Vec<RuntimeInstance>, RuntimeError>;

    /// Stop an instance, waiting at most `timeout_secs` before the runtime kills it.
    fn stop(&self, id: &str, timeout_secs: u32) -> Result<(), RuntimeError>;

    fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    fn launch(&self, spec: &LaunchSpec) -> Result<RuntimeInstance, RuntimeError>;

    /// Start a follower process streaming the last `tail` lines of output
    /// and then everything new. Output goes to the caller's stdout/stderr.
    fn follow_logs(&self, id: &str, tail: usize) -> Result<Child, RuntimeError>;
}

pub fn select_runtime(name: &str, binary: &str) -> Result<Box<dyn ContainerRuntime>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerRuntime::with_binary(binary))),
        "mock" => Ok(Box::new(crate::mock::MockRuntime::new())),
        other => Err(RuntimeError::Unavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_runtimes() {
        assert!(select_runtime("docker", "docker").is_ok());
        assert!(select_runtime("mock", "docker").is_ok());
    }

    #[test]
    fn select_invalid_runtime_fails() {
        assert!(select_runtime("podman-remote", "podman").is_err());
    }

    #[test]
    fn image_family_matching() {
        let family = "oxchief/oxchief-client";
        assert!(image_matches("oxchief/oxchief-client", family));
        assert!(image_matches("oxchief/oxchief-client:latest", family));
        assert!(image_matches("oxchief/oxchief-client@sha256:abcd", family));
        assert!(!image_matches("oxchief/oxchief-client-dev", family));
        assert!(!image_matches("redis:7", family));
    }

    #[test]
    fn bare_image_ids_are_recognised() {
        assert!(is_image_id("3f2a1b9c8d7e"));
        assert!(is_image_id(
            "sha256:3f2a1b9c8d7e3f2a1b9c8d7e3f2a1b9c8d7e3f2a1b9c8d7e3f2a1b9c8d7e"
        ));
        assert!(!is_image_id("oxchief/oxchief-client"));
        assert!(!is_image_id("cafe"));
        assert!(!is_image_id("redis:7"));
    }

    #[test]
    fn short_id_truncates() {
        let inst = RuntimeInstance {
            id: "0123456789abcdef0123".to_owned(),
            image: "img".to_owned(),
            role: None,
            running: true,
        };
        assert_eq!(inst.short_id(), "0123456789ab");
    }
}
