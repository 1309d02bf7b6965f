// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! tm1 - query and administer a TM1 server from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Server version and signed-in user
//! tm1 info
//!
//! # Run MDX
//! tm1 mdx "SELECT {[Period].[Jan]} ON 0 FROM [Sales]"
//!
//! # Run a saved view as JSON
//! tm1 view Sales Default --format json --pretty
//!
//! # Chores
//! tm1 chore list
//! tm1 chore set-start Nightly 2025-01-01T02:00:00
//!
//! # End the session
//! tm1 logout
//! ```

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tm1_rest::Tm1Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{chore, info, logout, mdx, view};

// ============================================================================
// CLI Definition
// ============================================================================

/// tm1 - TM1 / Planning Analytics REST client.
#[derive(Parser)]
#[command(name = "tm1")]
#[command(about = "TM1 / Planning Analytics REST client")]
#[command(long_about = r#"
Query and administer a TM1 server over its REST API.

Connection settings are read from ~/.config/tm1/config.yaml (or --config)
and can be overridden with --address, --port and --user. The password may
be supplied through the TM1_PASSWORD environment variable.

Examples:
  tm1 info                        # Version and signed-in user
  tm1 mdx "SELECT ..."            # Run MDX
  tm1 view Sales Default          # Run a saved view
  tm1 chore list                  # List chores
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Server address, overrides the configuration file.
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// HTTP port, overrides the configuration file.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// User name, overrides the configuration file.
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show server version and the signed-in user.
    #[command(visible_alias = "i")]
    Info,

    /// Execute an MDX query.
    Mdx(mdx::MdxArgs),

    /// Execute a saved view.
    View(view::ViewArgs),

    /// Manage chores.
    Chore(chore::ChoreArgs),

    /// End the server session.
    Logout,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Authentication failed.
    Auth = 2,
    /// The server rejected the request.
    Server = 3,
    /// Timeout.
    Timeout = 4,
}

impl ExitCode {
    fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<Tm1Error>() {
            Some(Tm1Error::Auth(_)) => Self::Auth,
            Some(e) if e.is_unauthorized() => Self::Auth,
            Some(Tm1Error::Http(_) | Tm1Error::Reactivation { .. }) => Self::Server,
            Some(Tm1Error::Timeout(_)) => Self::Timeout,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("tm1=debug,tm1_rest=debug,tm1_services=debug,info")
    } else {
        EnvFilter::new("tm1=warn,tm1_rest=warn,tm1_services=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Info => info::run(&cli).await,
        Commands::Mdx(args) => mdx::run(args, &cli).await,
        Commands::View(args) => view::run(args, &cli).await,
        Commands::Chore(args) => chore::run(args, &cli).await,
        Commands::Logout => logout::run(&cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_overrides_after_subcommand() {
        let cli = Cli::parse_from([
            "tm1", "mdx", "SELECT", "--address", "tm1.local", "--port", "8010", "-f", "json",
        ]);
        assert_eq!(cli.address.as_deref(), Some("tm1.local"));
        assert_eq!(cli.port, Some(8010));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Mdx(ref args) if args.query == "SELECT"));
    }

    #[test]
    fn test_parse_chore_set_start() {
        let cli = Cli::parse_from(["tm1", "chore", "set-start", "Nightly", "2025-01-01T02:00:00"]);
        let Commands::Chore(args) = cli.command else {
            panic!("expected chore command");
        };
        assert!(matches!(
            args.action,
            chore::ChoreAction::SetStart { ref name, .. } if name == "Nightly"
        ));
    }

    #[test]
    fn test_exit_code_for_timeout() {
        let err = anyhow::Error::from(Tm1Error::Timeout(std::time::Duration::from_secs(1)));
        assert_eq!(ExitCode::for_error(&err) as i32, 4);
    }
}
