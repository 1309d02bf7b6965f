//! Logout command - end the server session.

use anyhow::Result;
use tracing::info;

use super::connect;
use crate::Cli;

/// Runs the logout command.
pub async fn run(cli: &Cli) -> Result<()> {
    let tm1 = connect(cli).await?;
    let session = tm1.rest().session_id();
    tm1.close().await?;

    info!("Session closed");
    if !cli.quiet && !session.is_empty() {
        println!("Closed session {session}");
    }
    Ok(())
}
