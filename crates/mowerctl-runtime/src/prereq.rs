use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Check the host tools a launch needs. Empty means everything is present.
pub fn check_launch_prereqs(runtime_binary: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(runtime_binary) {
        missing.push(MissingPrereq {
            name: runtime_binary.to_owned(),
            purpose: "container runtime for role instances",
            install_hint: "curl -fsSL https://get.docker.com | sh",
        });
    }

    if !command_exists("udevadm") {
        missing.push(MissingPrereq {
            name: "udevadm".to_owned(),
            purpose: "USB device property lookup",
            install_hint: "part of systemd/udev (apt install udev)",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nmowerctl needs these tools to provision and launch role instances.");
    msg
}
