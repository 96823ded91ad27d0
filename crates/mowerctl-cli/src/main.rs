mod commands;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use commands::list_usb::Projection;
use commands::{Context, EXIT_FAILURE, EXIT_SUCCESS};
use mowerctl_core::{install_signal_handler, LauncherConfig};
use mowerctl_runtime::Role;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mowerctl",
    version,
    about = "Provision USB devices and launch mower runtime instances",
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to the launcher config file (defaults to ./mowerctl.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the device node of every attached serial-capable USB device.
    #[command(name = "list_usb_names")]
    ListUsbNames,
    /// Print "<node> - <serial>" for every attached serial-capable USB device.
    #[command(name = "list_usb_info")]
    ListUsbInfo,
    /// Print the launcher version.
    Version,
    /// Reset all instances and launch the autopilot client.
    Autopilot,
    /// Reset all instances and launch the base-station client.
    Base,
    /// Reset all instances and launch the obstacle-detection client.
    Obstacles,
    /// Serve host commands written into the command channel.
    Pipe {
        /// Only accept the reboot/restart/VPN vocabulary.
        #[arg(long, default_value_t = false)]
        restricted: bool,
    },
    /// Show this help.
    Help,
    /// Resolve the roles from the credential file and relaunch everything.
    Re,
    /// Follow the output of every running instance.
    Logs,
    /// List managed instances.
    Ps,
    /// Run diagnostic checks on the host and configuration.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return ExitCode::from(parse_failure(&e)),
    };

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MOWERCTL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        print_help();
        return ExitCode::from(EXIT_SUCCESS);
    };

    // Commands that never touch the host configuration.
    match command {
        Commands::Help => {
            print_help();
            return ExitCode::from(EXIT_SUCCESS);
        }
        Commands::Version => return ExitCode::from(commands::version::run(cli.json)),
        Commands::Completions { shell } => {
            return finish(commands::completions::run::<Cli>(shell));
        }
        _ => {}
    }

    install_signal_handler();

    let config = match LauncherConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let needs_runtime = matches!(
        command,
        Commands::Autopilot | Commands::Base | Commands::Obstacles | Commands::Re
    );
    if needs_runtime
        && config.runtime.backend != "mock"
        && std::env::var("MOWERCTL_SKIP_PREREQS").as_deref() != Ok("1")
    {
        let missing = mowerctl_runtime::check_launch_prereqs(&config.runtime.binary);
        if !missing.is_empty() {
            eprintln!("error: {}", mowerctl_runtime::format_missing(&missing));
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let ctx = Context {
        config,
        json: cli.json,
    };
    let result = match command {
        Commands::ListUsbNames => commands::list_usb::run(&ctx, Projection::Names),
        Commands::ListUsbInfo => commands::list_usb::run(&ctx, Projection::Info),
        Commands::Autopilot => commands::launch::run(&ctx, Role::Autopilot),
        Commands::Base => commands::launch::run(&ctx, Role::Base),
        Commands::Obstacles => commands::launch::run(&ctx, Role::Obstacle),
        Commands::Pipe { restricted } => commands::pipe::run(&ctx, restricted),
        Commands::Re => commands::re::run(&ctx),
        Commands::Logs => commands::logs::run(&ctx),
        Commands::Ps => commands::ps::run(&ctx),
        Commands::Doctor => commands::doctor::run(&ctx),
        Commands::Help | Commands::Version | Commands::Completions { .. } => Ok(EXIT_SUCCESS),
    };
    finish(result)
}

fn finish(result: Result<u8, String>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn print_help() {
    let mut cmd = Cli::command();
    let _ = cmd.print_help();
    println!();
}

/// Unknown or missing subcommands fall back to the help text and succeed;
/// stray arguments are reported before the help text and fail.
fn parse_failure(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            EXIT_SUCCESS
        }
        ErrorKind::InvalidSubcommand
        | ErrorKind::MissingSubcommand
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            print_help();
            EXIT_SUCCESS
        }
        _ => {
            let _ = err.print();
            println!();
            print_help();
            EXIT_FAILURE
        }
    }
}
