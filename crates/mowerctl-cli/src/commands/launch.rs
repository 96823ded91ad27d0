use super::{
    colorize_role, core_failure, json_pretty, spin_fail, spin_ok, spinner, Context, EXIT_SUCCESS,
};
use mowerctl_core::Supervisor;
use mowerctl_devices::Udevadm;
use mowerctl_runtime::Role;

pub fn run(ctx: &Context, role: Role) -> Result<u8, String> {
    let runtime = ctx.runtime()?;
    let udev = Udevadm::new();
    let supervisor = Supervisor::new(&ctx.config, runtime.as_ref(), &udev);

    let pb = if ctx.json {
        None
    } else {
        Some(spinner(&format!("starting {role}")))
    };
    let progress = |msg: &str| {
        if let Some(ref pb) = pb {
            pb.set_message(msg.to_owned());
        }
    };

    let instance = match supervisor.start(role, &progress) {
        Ok(inst) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("{role} launched"));
            }
            inst
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, &format!("{role} launch failed"));
            }
            return core_failure(&e);
        }
    };

    if ctx.json {
        println!("{}", json_pretty(&instance)?);
    } else {
        println!(
            "{} running as {}",
            colorize_role(role.as_str()),
            instance.short_id()
        );
    }
    Ok(EXIT_SUCCESS)
}
