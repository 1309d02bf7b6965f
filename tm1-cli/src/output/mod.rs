//! Output formatting for CLI.

mod json;
mod text;

pub use json::{InfoOutput, JsonFormatter};
pub use text::TextFormatter;
