use crate::relay::RelayMode;
use crate::CoreError;
use mowerctl_devices::RetryPolicy;
use mowerctl_runtime::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "MOWERCTL_CONFIG";
pub const RUNTIME_ENV_VAR: &str = "MOWERCTL_RUNTIME";
pub const DEFAULT_CONFIG_FILE: &str = "mowerctl.toml";

/// Everything the launcher reads from the host filesystem, passed explicitly
/// to each component instead of being read from fixed locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    pub scratch_dir: PathBuf,
    pub credential_file: PathBuf,
    pub app_config_file: PathBuf,
    pub usb_root: PathBuf,
    pub sysfs_root: PathBuf,
    pub roster: RosterConfig,
    pub runtime: RuntimeConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    pub info_file: String,
    pub names_file: String,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// `docker` or `mock`.
    pub backend: String,
    pub binary: String,
    pub image: String,
    pub stop_timeout_secs: u32,
    pub primary_port: u16,
    pub obstacle_port: u16,
    pub container_app_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub channel: PathBuf,
    pub container_channel: PathBuf,
    pub sink: PathBuf,
    pub mode: RelayMode,
    pub restart_command: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("temp"),
            credential_file: PathBuf::from("oxchief.env"),
            app_config_file: PathBuf::from("config.ini"),
            usb_root: PathBuf::from("/dev/bus/usb"),
            sysfs_root: PathBuf::from("/sys"),
            roster: RosterConfig::default(),
            runtime: RuntimeConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            info_file: "devices.txt".to_owned(),
            names_file: "device_names.txt".to_owned(),
            max_attempts: 10,
            backoff_ms: 1000,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: "docker".to_owned(),
            binary: "docker".to_owned(),
            image: "oxchief/oxchief-client".to_owned(),
            stop_timeout_secs: 10,
            primary_port: 8080,
            obstacle_port: 8081,
            container_app_dir: PathBuf::from("/app"),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: PathBuf::from("pipe/oxpipe"),
            container_channel: PathBuf::from("/oxpipe"),
            sink: PathBuf::from("pipe/output.txt"),
            mode: RelayMode::Shell,
            restart_command: "mowerctl re".to_owned(),
        }
    }
}

impl LauncherConfig {
    /// Defaults with relative paths anchored at `root`.
    pub fn with_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.anchor(root);
        config
    }

    /// Load a TOML config file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid {}: {e}", path.display())))?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.anchor(&base);
        Ok(config)
    }

    /// Resolve the config in order: explicit path, `MOWERCTL_CONFIG`,
    /// `./mowerctl.toml`, then built-in defaults anchored at the working dir.
    /// `MOWERCTL_RUNTIME` overrides the runtime backend afterwards.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = if let Some(path) = explicit {
            Self::load(path)?
        } else if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            Self::load(Path::new(&path))?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::load(Path::new(DEFAULT_CONFIG_FILE))?
        } else {
            Self::with_root(&std::env::current_dir()?)
        };

        if let Ok(backend) = std::env::var(RUNTIME_ENV_VAR) {
            if !backend.is_empty() {
                config.runtime.backend = backend;
            }
        }
        Ok(config)
    }

    fn anchor(&mut self, base: &Path) {
        for path in [
            &mut self.scratch_dir,
            &mut self.credential_file,
            &mut self.app_config_file,
            &mut self.usb_root,
            &mut self.sysfs_root,
            &mut self.relay.channel,
            &mut self.relay.sink,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn info_roster_path(&self) -> PathBuf {
        self.scratch_dir.join(&self.roster.info_file)
    }

    pub fn names_roster_path(&self) -> PathBuf {
        self.scratch_dir.join(&self.roster.names_file)
    }

    pub fn roster_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.roster.max_attempts,
            backoff: Duration::from_millis(self.roster.backoff_ms),
        }
    }

    /// Published port for a role; the obstacle detector gets its own.
    pub fn port_for(&self, role: Role) -> u16 {
        match role {
            Role::Obstacle => self.runtime.obstacle_port,
            Role::Autopilot | Role::Base => self.runtime.primary_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_anchor_relative_paths() {
        let config = LauncherConfig::with_root(Path::new("/srv/mower"));
        assert_eq!(config.scratch_dir, PathBuf::from("/srv/mower/temp"));
        assert_eq!(
            config.names_roster_path(),
            PathBuf::from("/srv/mower/temp/device_names.txt")
        );
        assert_eq!(config.relay.sink, PathBuf::from("/srv/mower/pipe/output.txt"));
        assert_eq!(config.usb_root, PathBuf::from("/dev/bus/usb"));
        assert_eq!(config.relay.container_channel, PathBuf::from("/oxpipe"));
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mowerctl.toml");
        std::fs::write(
            &path,
            r#"
scratch_dir = "scratch"

[runtime]
image = "registry.local/mower"
obstacle_port = 9000

[relay]
mode = "restricted"
"#,
        )
        .unwrap();

        let config = LauncherConfig::load(&path).unwrap();
        assert_eq!(config.scratch_dir, dir.path().join("scratch"));
        assert_eq!(config.runtime.image, "registry.local/mower");
        assert_eq!(config.port_for(Role::Obstacle), 9000);
        assert_eq!(config.port_for(Role::Autopilot), 8080);
        assert_eq!(config.relay.mode, RelayMode::Restricted);
        assert_eq!(config.roster.max_attempts, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mowerctl.toml");
        std::fs::write(&path, "scratch = \"typo\"\n").unwrap();
        assert!(matches!(
            LauncherConfig::load(&path),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LauncherConfig::discover(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn roster_policy_from_config() {
        let mut config = LauncherConfig::default();
        config.roster.backoff_ms = 0;
        let policy = config.roster_policy();
        assert_eq!(policy.max_attempts, 10);
        assert!(policy.backoff.is_zero());
    }
}
