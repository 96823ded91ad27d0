use super::{json_pretty, Context, EXIT_SUCCESS};
use mowerctl_core::{shutdown_requested, LogAggregator};

pub fn run(ctx: &Context) -> Result<u8, String> {
    let runtime = ctx.runtime()?;
    let report = LogAggregator::new(runtime.as_ref(), &ctx.config.runtime.image)
        .follow_all(&shutdown_requested)
        .map_err(|e| e.to_string())?;

    if ctx.json {
        let payload = serde_json::json!({
            "followed": report.followed,
            "cancelled": report.cancelled,
        });
        println!("{}", json_pretty(&payload)?);
    } else if report.followed == 0 {
        println!("no running instances");
    }
    Ok(EXIT_SUCCESS)
}
