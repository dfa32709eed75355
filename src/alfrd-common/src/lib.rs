mod message;
pub mod workdir;

// re-export for convenient use with `message`
pub use colored::Colorize;
