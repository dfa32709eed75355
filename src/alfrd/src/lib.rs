pub mod cli;
pub mod config;
pub mod constants;
pub mod livelog;
pub mod logframe;
pub mod logging;
pub mod plugins;
pub mod project;
pub mod registry;
pub mod sheets;
