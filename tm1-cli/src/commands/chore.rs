//! Chore command - inspect and control chores.

use anyhow::Result;
use clap::{Args, Subcommand};
use tm1_core::parse_start_time;
use tm1_services::Tm1Service;

use super::{connect, finish, text_formatter};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the chore command.
#[derive(Args)]
pub struct ChoreArgs {
    #[command(subcommand)]
    pub action: ChoreAction,
}

/// Chore subcommands.
#[derive(Subcommand)]
pub enum ChoreAction {
    /// List chore names.
    List,

    /// Show a chore with its tasks.
    Show {
        /// Chore name.
        name: String,
    },

    /// Run a chore now.
    Execute {
        /// Chore name.
        name: String,
    },

    /// Activate a chore.
    Activate {
        /// Chore name.
        name: String,
    },

    /// Deactivate a chore.
    Deactivate {
        /// Chore name.
        name: String,
    },

    /// Set the start time in server-local time, keeping the active state.
    SetStart {
        /// Chore name.
        name: String,
        /// Start time, e.g. 2025-01-01T02:00:00.
        start: String,
    },
}

/// Runs the chore command.
pub async fn run(args: &ChoreArgs, cli: &Cli) -> Result<()> {
    let tm1 = connect(cli).await?;
    let result = dispatch(&tm1, &args.action, cli).await;
    finish(tm1, result).await
}

async fn dispatch(tm1: &Tm1Service, action: &ChoreAction, cli: &Cli) -> Result<()> {
    let chores = tm1.chores();

    match action {
        ChoreAction::List => {
            let names = chores.get_all_names().await?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{}", text_formatter(cli).format_names("Chores", &names));
                }
                OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&names)?),
            }
        }
        ChoreAction::Show { name } => {
            let chore = chores.get(name).await?;
            match cli.format {
                OutputFormat::Text => println!("{}", text_formatter(cli).format_chore(&chore)),
                OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&chore)?),
            }
        }
        ChoreAction::Execute { name } => {
            chores.execute(name).await?;
            report(cli, &format!("Started {name}"));
        }
        ChoreAction::Activate { name } => {
            chores.activate(name).await?;
            report(cli, &format!("Activated {name}"));
        }
        ChoreAction::Deactivate { name } => {
            chores.deactivate(name).await?;
            report(cli, &format!("Deactivated {name}"));
        }
        ChoreAction::SetStart { name, start } => {
            let start = parse_start_time(start)?;
            chores.set_local_start_time(name, &start).await?;
            report(cli, &format!("{name} starts at {start}"));
        }
    }
    Ok(())
}

fn report(cli: &Cli, message: &str) {
    if !cli.quiet && cli.format == OutputFormat::Text {
        println!("{message}");
    }
}
