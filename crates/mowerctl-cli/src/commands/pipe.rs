use super::{Context, EXIT_SUCCESS};
use mowerctl_core::{shutdown_requested, CommandRelay, RelayMode};

pub fn run(ctx: &Context, restricted: bool) -> Result<u8, String> {
    let mut relay = CommandRelay::from_config(&ctx.config.relay);
    if restricted {
        relay = relay.with_mode(RelayMode::Restricted);
    }
    relay.ensure_channel().map_err(|e| e.to_string())?;

    if !ctx.json {
        eprintln!(
            "listening on {} (output in {})",
            relay.channel().display(),
            ctx.config.relay.sink.display()
        );
    }
    relay.run(&shutdown_requested).map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
