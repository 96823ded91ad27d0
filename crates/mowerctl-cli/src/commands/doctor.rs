use super::{Context, EXIT_FAILURE, EXIT_SUCCESS};
use mowerctl_core::{Credential, LauncherConfig};
use serde::Serialize;
use std::os::unix::fs::FileTypeExt;

pub fn run(ctx: &Context) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;
    let config = &ctx.config;

    check_prereqs(config, &mut checks, &mut all_pass);
    check_credential(config, &mut checks, &mut all_pass);

    if config.app_config_file.is_file() {
        checks.push(Check::pass(
            "app_config",
            &format!("Runtime config present at {}", config.app_config_file.display()),
        ));
    } else {
        all_pass = false;
        checks.push(Check::fail(
            "app_config",
            &format!("Runtime config missing: {}", config.app_config_file.display()),
        ));
    }

    if config.usb_root.exists() {
        checks.push(Check::pass(
            "usb_root",
            &format!("USB bus root {} exists", config.usb_root.display()),
        ));
    } else {
        checks.push(Check::warn(
            "usb_root",
            &format!(
                "USB bus root {} not found (no devices will be granted)",
                config.usb_root.display()
            ),
        ));
    }

    check_channel(config, &mut checks);
    check_instances(ctx, &mut checks, &mut all_pass);

    print_results(&checks, all_pass, ctx.json)
}

fn check_prereqs(config: &LauncherConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if config.runtime.backend == "mock" {
        checks.push(Check::info("runtime_prereqs", "Mock runtime selected"));
        return;
    }
    let missing = mowerctl_runtime::check_launch_prereqs(&config.runtime.binary);
    if missing.is_empty() {
        checks.push(Check::pass(
            "runtime_prereqs",
            "Runtime prerequisites satisfied",
        ));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "runtime_prereqs",
            &format!(
                "Missing prerequisites: {}",
                mowerctl_runtime::format_missing(&missing)
            ),
        ));
    }
}

fn check_credential(config: &LauncherConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let resolved = Credential::load(&config.credential_file)
        .and_then(|c| c.deployment().map(|d| (c, d)));
    match resolved {
        Ok((credential, deployment)) => checks.push(Check::pass(
            "credential",
            &format!(
                "Credential {} resolves to a {deployment} deployment",
                credential.path().display()
            ),
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("credential", &e.to_string()));
        }
    }
}

fn check_channel(config: &LauncherConfig, checks: &mut Vec<Check>) {
    let channel = &config.relay.channel;
    match std::fs::symlink_metadata(channel) {
        Ok(meta) if meta.file_type().is_fifo() => checks.push(Check::pass(
            "command_channel",
            &format!("Command channel {} is a FIFO", channel.display()),
        )),
        Ok(_) => checks.push(Check::warn(
            "command_channel",
            &format!("{} exists but is not a FIFO", channel.display()),
        )),
        Err(_) => checks.push(Check::info(
            "command_channel",
            "Command channel not created yet (created on first launch)",
        )),
    }
}

fn check_instances(ctx: &Context, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let runtime = match ctx.runtime() {
        Ok(rt) => rt,
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("runtime", &e));
            return;
        }
    };
    if !runtime.available() {
        *all_pass = false;
        checks.push(Check::fail(
            "runtime",
            &format!("Runtime '{}' is not responding", runtime.name()),
        ));
        return;
    }
    checks.push(Check::pass(
        "runtime",
        &format!("Runtime '{}' available", runtime.name()),
    ));

    match runtime.list(&ctx.config.runtime.image, true) {
        Ok(instances) => {
            let running = instances.iter().filter(|i| i.running).count();
            checks.push(Check::info(
                "instances",
                &format!("{} managed instances ({running} running)", instances.len()),
            ));
        }
        Err(e) => checks.push(Check::warn(
            "instances",
            &format!("Cannot list instances: {e}"),
        )),
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("mowerctl doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
