use super::{
    colorize_role, core_failure, json_pretty, spin_fail, spin_ok, spinner, Context, EXIT_SUCCESS,
};
use mowerctl_core::{reenter, Supervisor};
use mowerctl_devices::Udevadm;
use mowerctl_runtime::Role;

pub fn run(ctx: &Context) -> Result<u8, String> {
    let runtime = ctx.runtime()?;
    let udev = Udevadm::new();
    let supervisor = Supervisor::new(&ctx.config, runtime.as_ref(), &udev);

    let pb = if ctx.json {
        None
    } else {
        Some(spinner("clearing prior instances"))
    };
    let progress = |msg: &str| {
        if let Some(ref pb) = pb {
            pb.set_message(msg.to_owned());
        }
    };

    let report = match reenter(&supervisor, &progress) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("{} deployment launched", r.deployment));
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "re-entry failed");
            }
            return core_failure(&e);
        }
    };

    if ctx.json {
        let payload = serde_json::json!({
            "deployment": report.deployment.to_string(),
            "removed": report.removed,
            "launched": report.launched,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("removed {} prior instances", report.removed);
        for inst in &report.launched {
            let role = inst.role.map_or("unknown", Role::as_str);
            println!("  {} {}", colorize_role(role), inst.short_id());
        }
    }
    Ok(EXIT_SUCCESS)
}
