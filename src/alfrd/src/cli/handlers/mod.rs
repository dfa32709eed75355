mod config;
mod project;
mod run;
mod sheet;

pub(super) use config::{bind, param, save};
pub(super) use project::{add, create, list, rm, show};
pub(super) use run::run_step;
pub(super) use sheet::sheet_show;

use crate::config::Config;
use crate::project::Project;
use anyhow::Result;

fn project(config: &Config, name: &str) -> Project {
    Project::builder()
        .name(name)
        .projects_dir(config.projects_dir.clone())
        .use_symlink(config.use_symlink)
        .build()
}

/// Registers the project's scripts, then applies its config.yaml if there is one.
fn load_configured(project: &Project) -> Result<()> {
    project.load_project()?;
    let configuration = project.configure()?;
    if configuration.configfile.is_file() {
        configuration.load()?;
    }
    Ok(())
}
