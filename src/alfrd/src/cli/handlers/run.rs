use super::{load_configured, project};
use crate::config::Config;
use alfrd_common::{success_message, Colorize};
use anyhow::{Context, Result};

pub fn run_step(config: &Config, name: &str, step: &str) -> Result<()> {
    let project = project(config, name);
    load_configured(&project)?;
    let value = project
        .registry
        .read()
        .run_step(step)
        .with_context(|| format!("step {step} of project {name} failed"))?;
    success_message!("{} finished", step);
    let output = value.to_plain_string();
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
