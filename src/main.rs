//! Adhan CLI - prayer-time alarms for the desktop
//!
//! The same binary runs the background daemon (`adhan daemon`) and the
//! client commands that talk to it over a Unix socket.

use anyhow::Result;
use clap::{CommandFactory, Parser};

use adhan::cli::{Cli, Commands, Display, IpcClient};
use adhan::config::DaemonConfig;
use adhan::launchagent::{self, LaunchAgentError};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(default_log_level(&cli));

    if let Err(e) = execute(cli).await {
        Display::show_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log level used when `RUST_LOG` is unset.
fn default_log_level(cli: &Cli) -> &'static str {
    if cli.verbose || matches!(cli.command, Some(Commands::Daemon)) {
        "info"
    } else {
        "warn"
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Loads the configuration named by `--config`, or the default one.
fn load_config(cli: &Cli) -> Result<DaemonConfig> {
    match &cli.config {
        Some(path) => DaemonConfig::load(path),
        None => DaemonConfig::load_default(),
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        generate_completions(shell);
        return Ok(());
    }

    let config = load_config(&cli)?;

    match command {
        Commands::Daemon => adhan::daemon::run(config).await?,
        Commands::Install => {
            let config_file = cli.config.as_deref().map(std::path::absolute).transpose()?;
            launchagent::install(&config, config_file.as_deref()).map_err(with_hint)?;
            Display::show_install_success();
        }
        Commands::Uninstall => {
            launchagent::uninstall().map_err(with_hint)?;
            Display::show_uninstall_success();
        }
        command => {
            let Some(request) = command.to_request() else {
                return Ok(());
            };
            let response = IpcClient::from_config(&config).send(&request).await?;
            match command {
                Commands::Schedule(_) => Display::show_scheduled(&response),
                Commands::Status => Display::show_status(&response),
                Commands::Sounds => Display::show_sounds(&response),
                Commands::CanScheduleExact | Commands::PowerStatus => {
                    Display::show_capability(&response);
                }
                _ => Display::show_success(&response),
            }
        }
    }

    Ok(())
}

/// Appends the error's suggestion to its message.
fn with_hint(e: LaunchAgentError) -> anyhow::Error {
    match e.suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  {}", e, hint),
        None => e.into(),
    }
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
