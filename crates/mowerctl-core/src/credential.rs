use crate::CoreError;
use mowerctl_runtime::Role;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key naming the deployment explicitly.
pub const ROLE_KEY: &str = "role";
/// Per-robot identifier whose presence marks a robot when `role` is absent.
pub const ROBOT_ID_KEY: &str = "robot_id";

/// What this host runs: a robot (autopilot + obstacle detector) or a base station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Robot,
    Base,
}

impl Deployment {
    /// Roles launched for this deployment, in launch order.
    pub fn roles(self) -> &'static [Role] {
        match self {
            Deployment::Robot => &[Role::Autopilot, Role::Obstacle],
            Deployment::Base => &[Role::Base],
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Robot => f.write_str("robot"),
            Deployment::Base => f.write_str("base"),
        }
    }
}

/// The auth env file handed to every instance.
///
/// Values are passed through to the runtime untouched; only the deployment
/// keys are ever inspected here.
#[derive(Debug, Clone)]
pub struct Credential {
    path: PathBuf,
    vars: Vec<(String, String)>,
}

impl Credential {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::MissingCredential(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            vars: parse_env_file(&content),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// An explicit `role` wins and must be valid; otherwise a non-empty
    /// `robot_id` means robot and its absence means base station.
    pub fn deployment(&self) -> Result<Deployment, CoreError> {
        if let Some(role) = self.get(ROLE_KEY) {
            return match role.trim() {
                "robot" => Ok(Deployment::Robot),
                "base" => Ok(Deployment::Base),
                other => Err(CoreError::InvalidCredential {
                    path: self.path.clone(),
                    reason: format!("{ROLE_KEY}='{other}' (expected 'robot' or 'base')"),
                }),
            };
        }

        let deployment = if self.get(ROBOT_ID_KEY).is_some_and(|v| !v.trim().is_empty()) {
            Deployment::Robot
        } else {
            Deployment::Base
        };
        debug!(
            "no '{ROLE_KEY}' key in {}; inferred {deployment} from '{ROBOT_ID_KEY}'",
            self.path.display()
        );
        Ok(deployment)
    }
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments. An `export `
/// prefix and one layer of matching quotes are stripped.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), unquote(value.trim()).to_owned()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
