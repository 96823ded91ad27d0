use crate::config::RelayConfig;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

const START_VPN: &str = "sudo service tailscaled start;sudo tailscale up";
const STOP_VPN: &str = "sudo tailscale down;sudo service tailscaled stop";
const REBOOT: &str = "sudo reboot";

/// How text read from the command channel is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Run the text verbatim with `sh -c`. Anything written to the channel
    /// executes with the relay's privileges.
    #[default]
    Shell,
    /// Only run the `PrivilegedCommand` vocabulary; reject everything else.
    Restricted,
}

/// Host actions a confined instance may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedCommand {
    Reboot,
    RestartRuntime,
    StartVpn,
    StopVpn,
}

impl PrivilegedCommand {
    /// Accepts the keyword forms as well as the literal command lines the
    /// instances already write.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "reboot" | REBOOT => Some(Self::Reboot),
            "restart" | "restart_runtime" => Some(Self::RestartRuntime),
            "start_vpn" | START_VPN => Some(Self::StartVpn),
            "stop_vpn" | STOP_VPN => Some(Self::StopVpn),
            _ if text.ends_with("/re.sh") && !text.contains(char::is_whitespace) => {
                Some(Self::RestartRuntime)
            }
            _ => None,
        }
    }

    pub fn host_command(self, restart_command: &str) -> String {
        match self {
            Self::Reboot => REBOOT.to_owned(),
            Self::RestartRuntime => restart_command.to_owned(),
            Self::StartVpn => START_VPN.to_owned(),
            Self::StopVpn => STOP_VPN.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The command ran; `status` is its exit code (`None` if killed by a signal).
    Executed { status: Option<i32> },
    /// The shell could not be started; the error went to the sink.
    SpawnFailed,
    /// Restricted mode refused the text.
    Rejected,
}

/// Host-side loop executing commands written into the command channel.
///
/// Commands are handled strictly one at a time. The combined output of the
/// latest command replaces the sink's previous contents; nothing is sent back
/// to the writer.
pub struct CommandRelay {
    channel: PathBuf,
    sink: PathBuf,
    mode: RelayMode,
    restart_command: String,
}

impl CommandRelay {
    pub fn new(channel: impl Into<PathBuf>, sink: impl Into<PathBuf>) -> Self {
        Self {
            channel: channel.into(),
            sink: sink.into(),
            mode: RelayMode::Shell,
            restart_command: RelayConfig::default().restart_command,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            sink: config.sink.clone(),
            mode: config.mode,
            restart_command: config.restart_command.clone(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_restart_command(mut self, command: &str) -> Self {
        command.clone_into(&mut self.restart_command);
        self
    }

    pub fn channel(&self) -> &Path {
        &self.channel
    }

    /// Create the channel as a FIFO if nothing exists at its path yet. Any
    /// other kind of entry at that path is an error.
    pub fn ensure_channel(&self) -> Result<(), CoreError> {
        ensure_fifo(&self.channel)
    }

    /// Block until a writer has delivered a complete command, then run it.
    /// Returns `None` when the read was empty.
    ///
    /// The channel must be a FIFO: a regular file would never block and hand
    /// back the same command on every read.
    pub fn run_once(&self) -> Result<Option<RelayOutcome>, CoreError> {
        require_fifo(&self.channel)?;
        let mut text = String::new();
        File::open(&self.channel)?.read_to_string(&mut text)?;
        let text = text.trim();
        if text.is_empty() {
            debug!("empty read from {}", self.channel.display());
            return Ok(None);
        }
        self.execute(text).map(Some)
    }

    /// Run `text` according to the relay mode, replacing the sink contents.
    pub fn execute(&self, text: &str) -> Result<RelayOutcome, CoreError> {
        let command = match self.mode {
            RelayMode::Shell => text.to_owned(),
            RelayMode::Restricted => {
                if let Some(cmd) = PrivilegedCommand::parse(text) {
                    cmd.host_command(&self.restart_command)
                } else {
                    warn!("rejected privileged command: {text}");
                    let mut sink = self.open_sink()?;
                    writeln!(sink, "rejected: {text}")?;
                    return Ok(RelayOutcome::Rejected);
                }
            }
        };

        info!("relaying host command: {command}");
        let sink = self.open_sink()?;
        let result = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink.try_clone()?))
            .stderr(Stdio::from(sink.try_clone()?))
            .status();

        match result {
            Ok(status) => {
                if !status.success() {
                    debug!("relayed command exited with {status}");
                }
                Ok(RelayOutcome::Executed {
                    status: status.code(),
                })
            }
            Err(e) => {
                let mut sink = sink;
                writeln!(sink, "failed to start shell: {e}")?;
                Ok(RelayOutcome::SpawnFailed)
            }
        }
    }

    /// Serve commands until `stop` returns true. Command failures never end
    /// the loop; channel I/O errors are logged and retried after a pause.
    /// A channel that is missing or not a FIFO ends the loop with an error.
    pub fn run(&self, stop: &dyn Fn() -> bool) -> Result<(), CoreError> {
        require_fifo(&self.channel)?;
        info!(
            "relaying commands from {} (mode {:?})",
            self.channel.display(),
            self.mode
        );
        while !stop() {
            match self.run_once() {
                Ok(_) => {}
                Err(e @ CoreError::Config(_)) => return Err(e),
                Err(e) => {
                    warn!("command channel error: {e}");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
        Ok(())
    }

    fn open_sink(&self) -> Result<File, CoreError> {
        if let Some(parent) = self.sink.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(File::create(&self.sink)?)
    }
}

fn not_a_fifo(path: &Path) -> CoreError {
    CoreError::Config(format!(
        "command channel {} exists but is not a FIFO; remove it and retry",
        path.display()
    ))
}

fn require_fifo(path: &Path) -> Result<(), CoreError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(()),
        Ok(_) => Err(not_a_fifo(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::Config(format!(
            "command channel {} does not exist",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

#[allow(unsafe_code)]
fn ensure_fifo(path: &Path) -> Result<(), CoreError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => return Ok(()),
        Ok(_) => return Err(not_a_fifo(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| CoreError::Config(format!("invalid channel path {}", path.display())))?;
    // SAFETY: mkfifo with a valid NUL-terminated path has no memory effects.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // mkfifo applies the umask; writers inside the instance need 0666.
    std::fs::set_permissions(
        path,
        <std::fs::Permissions as std::os::unix::fs::PermissionsExt>::from_mode(0o666),
    )?;
    info!("created command channel {}", path.display());
    Ok(())
}
