//! CLI command implementations.

pub mod chore;
pub mod info;
pub mod logout;
pub mod mdx;
pub mod view;

use anyhow::Result;
use tm1_services::Tm1Service;
use tracing::debug;

use crate::Cli;
use crate::config::{Overrides, load_config};
use crate::output::TextFormatter;

/// Loads the configuration and opens a session.
pub async fn connect(cli: &Cli) -> Result<Tm1Service> {
    let config = load_config(cli.config.as_deref(), Overrides::from_cli(cli))?;
    let tm1 = Tm1Service::connect(config).await?;
    debug!(version = tm1.version(), "Connected");
    Ok(tm1)
}

/// Text formatter honoring `--no-color`.
pub fn text_formatter(cli: &Cli) -> TextFormatter {
    TextFormatter::new(!cli.no_color)
}

/// Closes the session, keeping the command's own error if it has one.
pub async fn finish<T>(tm1: Tm1Service, result: Result<T>) -> Result<T> {
    let closed = tm1.close().await;
    let value = result?;
    closed?;
    Ok(value)
}
