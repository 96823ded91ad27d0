pub mod completions;
pub mod doctor;
pub mod launch;
pub mod list_usb;
pub mod logs;
pub mod pipe;
pub mod ps;
pub mod re;
pub mod version;

use indicatif::{ProgressBar, ProgressStyle};
use mowerctl_core::{CoreError, LauncherConfig};
use mowerctl_runtime::{select_runtime, ContainerRuntime};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Resolved global state shared by every host-facing command.
pub struct Context {
    pub config: LauncherConfig,
    pub json: bool,
}

impl Context {
    pub fn runtime(&self) -> Result<Box<dyn ContainerRuntime>, String> {
        select_runtime(&self.config.runtime.backend, &self.config.runtime.binary)
            .map_err(|e| e.to_string())
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Exit with the container CLI's own code when it produced the failure,
/// otherwise report through the generic failure path.
pub fn core_failure(err: &CoreError) -> Result<u8, String> {
    match err.native_code().and_then(|c| u8::try_from(c).ok()) {
        Some(code) if code != EXIT_SUCCESS => {
            eprintln!("error: {err}");
            Ok(code)
        }
        _ => Err(err.to_string()),
    }
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&[".  ", ".. ", "...", " ..", "  .", "   "]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_role(role: &str) -> String {
    use console::Style;
    match role {
        "autopilot" => Style::new().green().bold().apply_to(role).to_string(),
        "obstacle" => Style::new().magenta().apply_to(role).to_string(),
        "base" => Style::new().blue().apply_to(role).to_string(),
        other => other.to_owned(),
    }
}

pub fn colorize_state(running: bool) -> String {
    use console::Style;
    if running {
        Style::new().cyan().bold().apply_to("running").to_string()
    } else {
        Style::new().dim().apply_to("stopped").to_string()
    }
}
