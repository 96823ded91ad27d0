use super::{colorize_role, colorize_state, json_pretty, Context, EXIT_SUCCESS};
use mowerctl_runtime::Role;

pub fn run(ctx: &Context) -> Result<u8, String> {
    let runtime = ctx.runtime()?;
    let instances = runtime
        .list(&ctx.config.runtime.image, true)
        .map_err(|e| e.to_string())?;

    if ctx.json {
        println!("{}", json_pretty(&instances)?);
    } else if instances.is_empty() {
        println!("no managed instances");
    } else {
        println!("{:<14} {:<12} {:<10} IMAGE", "ID", "ROLE", "STATE");
        for inst in &instances {
            let role = inst.role.map_or("-", Role::as_str);
            println!(
                "{:<14} {:<12} {:<10} {}",
                inst.short_id(),
                colorize_role(role),
                colorize_state(inst.running),
                inst.image
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
