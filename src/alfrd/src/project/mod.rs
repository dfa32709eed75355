pub mod configuration;
mod manager;
pub mod yaml;

pub use configuration::ProjectConfiguration;
pub use manager::Project;
