//! Info command - server version and signed-in user.

use anyhow::Result;
use tm1_services::Tm1Service;

use super::{connect, finish, text_formatter};
use crate::output::{InfoOutput, JsonFormatter};
use crate::{Cli, OutputFormat};

/// Runs the info command.
pub async fn run(cli: &Cli) -> Result<()> {
    let tm1 = connect(cli).await?;
    let result = collect(&tm1).await;
    let info = finish(tm1, result).await?;

    match cli.format {
        OutputFormat::Text => println!("{}", text_formatter(cli).format_info(&info)),
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&info)?),
    }
    Ok(())
}

async fn collect(tm1: &Tm1Service) -> Result<InfoOutput> {
    let user = tm1.users().active_user().await?;
    Ok(InfoOutput {
        base_url: tm1.rest().base_url().to_string(),
        version: tm1.version().to_string(),
        admin: user.is_admin(),
        data_admin: user.is_data_admin(),
        user: user.name,
    })
}
