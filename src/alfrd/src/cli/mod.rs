pub mod commands;
mod handlers;
mod process_command;

pub use process_command::process_command;
