pub mod cli_args;
#[allow(clippy::module_inception)]
pub mod client;
pub mod client_connection;
pub mod formatter;

pub use cli_args::{split_command_line, CliArgs};
pub use client::Client;
pub use client_connection::ClientConnection;
pub use formatter::OutputFormatter;
