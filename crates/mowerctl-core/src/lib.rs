//! Launch orchestration for mowerctl.
//!
//! This crate ties device provisioning and the container runtime together:
//! the `Supervisor` resets and launches role instances, `reenter` resolves the
//! roles from the credential file and relaunches everything, `CommandRelay`
//! executes host commands requested through the command channel, and
//! `LogAggregator` follows the output of every running instance. All paths
//! come from an explicitly passed `LauncherConfig`.

pub mod concurrency;
pub mod config;
pub mod credential;
pub mod logs;
pub mod orchestrator;
pub mod permissions;
pub mod relay;
pub mod supervisor;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::{LauncherConfig, RelayConfig, RosterConfig, RuntimeConfig};
pub use credential::{Credential, Deployment};
pub use logs::{FollowReport, LogAggregator};
pub use orchestrator::{reenter, Reentry};
pub use relay::{CommandRelay, PrivilegedCommand, RelayMode, RelayOutcome};
pub use supervisor::Supervisor;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device error: {0}")]
    Devices(#[from] mowerctl_devices::DeviceError),
    #[error("runtime error: {0}")]
    Runtime(#[from] mowerctl_runtime::RuntimeError),
    #[error("config error: {0}")]
    Config(String),
    #[error("credential file not found: {0} (the launcher needs the robot's auth env file)")]
    MissingCredential(PathBuf),
    #[error("invalid credential file {path}: {reason}")]
    InvalidCredential { path: PathBuf, reason: String },
    #[error("required file not found: {0}")]
    MissingFile(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Exit code of the container CLI when this error came from it unchanged.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::Runtime(e) => e.native_code(),
            _ => None,
        }
    }
}
