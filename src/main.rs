//! ydo-launcher - run an input-device program alongside ydotoold
//!
//! One run does four things in order:
//! - stops any ydotoold left from before
//! - starts ydotoold on a private socket, logging to a file
//! - runs the Python main program under sudo with the caller's PATH
//! - stops ydotoold again, whatever the main program did

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use ydo_launcher::cli::{Cli, Commands, Display, RunArgs};
use ydo_launcher::config::LaunchConfig;
use ydo_launcher::{daemon, launcher};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    match execute(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            Display::show_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command and returns the process exit code.
async fn execute(cli: Cli) -> Result<i32> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let mut config = LaunchConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Some(Commands::Run(args)) => run(config, &args).await,
        None => run(config, &RunArgs::default()).await,
        Some(Commands::Stop { no_sweep }) => {
            if no_sweep {
                config.sweep_stale = false;
            }
            Display::show_stop_result(launcher::stop(&config).await);
            Ok(0)
        }
        Some(Commands::Status { json }) => {
            let status = daemon::status(&config);
            if json {
                let out = serde_json::to_string_pretty(&status)
                    .context("Failed to serialize status")?;
                println!("{}", out);
            } else {
                Display::show_status(&config, &status);
            }
            Ok(0)
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
            Ok(0)
        }
    }
}

/// Runs the launch sequence with CLI overrides applied.
async fn run(mut config: LaunchConfig, args: &RunArgs) -> Result<i32> {
    config.apply_overrides(&args.overrides());
    config.validate().context("Invalid launcher configuration")?;

    let report = launcher::launch(&config).await;
    Display::show_run_summary(&report);

    Ok(report.process_exit_code(config.propagate_exit))
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
