use super::{load_configured, project};
use crate::config::Config;
use crate::registry::{Category, Value, DESC_KEY};
use alfrd_common::{info_message, success_message, warning_message, Colorize};
use anyhow::Result;
use std::path::PathBuf;

pub fn create(config: &Config, name: &str) -> Result<()> {
    let dir = project(config, name).create()?;
    success_message!("Project {} created at {}", name, dir.display());
    Ok(())
}

pub fn rm(config: &Config, name: &str) -> Result<()> {
    project(config, name).rm()?;
    success_message!("Project {} removed", name);
    Ok(())
}

pub fn list(config: &Config) -> Result<()> {
    let projects = project(config, "").list_projects()?;
    if projects.is_empty() {
        info_message!("No projects in {}", config.projects_dir.display());
    }
    for name in projects {
        println!("{name}");
    }
    Ok(())
}

pub fn add(config: &Config, name: &str, paths: &[PathBuf], copy: bool) -> Result<()> {
    let mut project = project(config, name);
    project.use_symlink = project.use_symlink && !copy;
    project.add(paths)?;
    let missing: Vec<_> = paths.iter().filter(|p| std::fs::symlink_metadata(p).is_err()).collect();
    if !missing.is_empty() {
        warning_message!("not found: {:?}", missing);
    }
    success_message!("{} path(s) added to {}", paths.len() - missing.len(), name);
    Ok(())
}

pub fn show(config: &Config, name: &str) -> Result<()> {
    let project = project(config, name);
    let dir = project.get_projdir(false)?;
    load_configured(&project)?;

    println!("{} {}", "Project:".bold(), dir.display());
    let registry = project.registry.read();

    println!("{}", "Steps:".bold());
    for (step, params) in registry.category(Category::Registered) {
        let desc = params.get(DESC_KEY).map(Value::to_plain_string).unwrap_or_default();
        println!("  {} {}", step.cyan(), desc.dimmed());
        for (key, value) in params.iter().filter(|(key, value)| {
            key.as_str() != DESC_KEY && !matches!(value, Value::Func(_))
        }) {
            println!("      {key} = {value}");
        }
        for (label, category) in [("before", Category::ValidateBefore), ("after", Category::ValidateAfter)] {
            let hooks: Vec<_> = registry
                .hooks(category, step)
                .iter()
                .map(|f| f.name().to_string())
                .collect();
            if !hooks.is_empty() {
                println!("      {label}: {}", hooks.join(", "));
            }
        }
    }

    println!("{}", "Validators:".bold());
    for name in registry.validator_names() {
        println!("  {}", name.cyan());
    }
    Ok(())
}
