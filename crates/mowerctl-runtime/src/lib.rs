//! Container runtime layer for mowerctl.
//!
//! This crate defines the pluggable `ContainerRuntime` trait used to list,
//! stop, remove, launch, and follow managed instances, the `LaunchSpec` that
//! describes one role's instance, a `docker` CLI backend, an in-memory mock
//! backend, and host prerequisite checks.

pub mod backend;
pub mod docker;
pub mod mock;
pub mod prereq;
pub mod spec;

pub use backend::{select_runtime, ContainerRuntime, RuntimeInstance};
pub use prereq::{check_launch_prereqs, format_missing, MissingPrereq};
pub use spec::{BindMount, LaunchSpec, PortMapping, Role, ROLE_LABEL};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runtime '{0}' is not available on this system")]
    Unavailable(String),
    #[error("{command} exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("instance not found: {0}")]
    NotFound(String),
    #[error("unknown role '{0}' (expected autopilot, base, or obstacle)")]
    UnknownRole(String),
}

impl RuntimeError {
    /// Exit code reported by the container CLI, if this error carries one.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
