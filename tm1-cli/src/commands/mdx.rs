//! MDX command - execute a query through a server-side cellset.

use anyhow::Result;
use clap::Args;

use super::{connect, finish, text_formatter};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the mdx command.
#[derive(Args)]
pub struct MdxArgs {
    /// MDX query.
    pub query: String,

    /// Sandbox to read from.
    #[arg(long)]
    pub sandbox: Option<String>,

    /// Cell properties to return (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub properties: Vec<String>,

    /// Return values only.
    #[arg(long)]
    pub values: bool,
}

/// Runs the mdx command.
pub async fn run(args: &MdxArgs, cli: &Cli) -> Result<()> {
    let tm1 = connect(cli).await?;
    let result = tm1
        .cells()
        .execute_mdx(&args.query, &args.properties, args.sandbox.as_deref())
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
