//! View command - execute a saved view.

use anyhow::Result;
use clap::Args;

use super::{connect, finish, text_formatter};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the view command.
#[derive(Args)]
pub struct ViewArgs {
    /// Cube name.
    pub cube: String,

    /// View name.
    pub view: String,

    /// The view is private to the signed-in user.
    #[arg(long)]
    pub private: bool,

    /// Sandbox to read from.
    #[arg(long)]
    pub sandbox: Option<String>,

    /// Return values only.
    #[arg(long)]
    pub values: bool,
}

/// Runs the view command.
pub async fn run(args: &ViewArgs, cli: &Cli) -> Result<()> {
    let tm1 = connect(cli).await?;
    let result = tm1
        .cells()
        .execute_view(
            &args.cube,
            &args.view,
            args.private,
            &[],
            args.sandbox.as_deref(),
        )
        .await
        .map_err(Into::into);
    let cells = finish(tm1, result).await?;

    match cli.format {
        OutputFormat::Text => println!("{}", text_formatter(cli).format_cells(&cells)),
        OutputFormat::Json => println!(
            "{}",
            JsonFormatter::new(cli.pretty).format_cells(&cells, args.values)?
        ),
    }
    Ok(())
}
