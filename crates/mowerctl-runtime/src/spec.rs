use crate::RuntimeError;
use mowerctl_devices::DeviceGrant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Label key carrying the role on every launched instance.
pub const ROLE_LABEL: &str = "mowerctl.role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Autopilot,
    Base,
    Obstacle,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Autopilot, Role::Base, Role::Obstacle];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Autopilot => "autopilot",
            Role::Base => "base",
            Role::Obstacle => "obstacle",
        }
    }

    /// Argument passed to the image entrypoint to pick the application.
    pub fn entrypoint(self) -> &'static str {
        match self {
            Role::Autopilot => "autopilot",
            Role::Base => "base",
            Role::Obstacle => "obstacles",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "autopilot" => Ok(Role::Autopilot),
            "base" => Ok(Role::Base),
            "obstacle" | "obstacles" => Ok(Role::Obstacle),
            other => Err(RuntimeError::UnknownRole(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub read_only: bool,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    fn to_volume(&self) -> String {
        let mut v = format!("{}:{}", self.source.display(), self.target.display());
        if self.read_only {
            v.push_str(":ro");
        }
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    pub fn same(port: u16) -> Self {
        Self {
            host: port,
            container: port,
        }
    }
}

/// Everything needed to start one managed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub image: String,
    pub role: Role,
    pub env_file: PathBuf,
    pub mounts: Vec<BindMount>,
    pub devices: Vec<DeviceGrant>,
    pub port: PortMapping,
}

impl LaunchSpec {
    /// Arguments following `run` for a detached container CLI launch.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_owned(),
            "--label".to_owned(),
            format!("{ROLE_LABEL}={}", self.role),
            "--env-file".to_owned(),
            self.env_file.display().to_string(),
        ];
        for mount in &self.mounts {
            args.push("-v".to_owned());
            args.push(mount.to_volume());
        }
        args.extend(self.devices.iter().map(DeviceGrant::to_arg));
        args.push("-p".to_owned());
        args.push(format!("{}:{}", self.port.host, self.port.container));
        args.push(self.image.clone());
        args.push(self.role.entrypoint().to_owned());
        args
    }
}
