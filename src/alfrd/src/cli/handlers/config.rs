use super::{load_configured, project};
use crate::config::Config;
use crate::project::yaml::{load_yaml_str, yaml_to_value};
use crate::registry::{Params, Value};
use alfrd_common::{success_message, warning_message, Colorize};
use anyhow::Result;

pub fn save(config: &Config, name: &str, fresh: bool) -> Result<()> {
    let project = project(config, name);
    if fresh {
        project.load_project()?;
    } else {
        load_configured(&project)?;
    }
    let configuration = project.configure()?;
    configuration.save()?;
    success_message!("Saved {}", configuration.configfile.display());
    Ok(())
}

pub fn bind(config: &Config, name: &str, step: &str, before: &[String], after: &[String]) -> Result<()> {
    let project = project(config, name);
    load_configured(&project)?;
    let mut configuration = project.configure()?;
    configuration.func(step);

    for (label, names) in [("before", before), ("after", after)] {
        if names.is_empty() {
            continue;
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let bound = if label == "before" {
            configuration.validate_before(&names)?
        } else {
            configuration.validate_after(&names)?
        };
        if bound.len() < names.len() {
            warning_message!("some validators do not exist, bound {} {step}: {:?}", label, bound);
        }
    }

    configuration.save()?;
    success_message!("Bindings of {} saved to {}", step, configuration.configfile.display());
    Ok(())
}

pub fn param(config: &Config, name: &str, step: &str, pairs: Vec<(String, String)>, edit: bool) -> Result<()> {
    let mut params = Params::new();
    for (key, raw) in pairs {
        params.insert(key, parse_param_value(&raw)?);
    }

    let project = project(config, name);
    load_configured(&project)?;
    let mut configuration = project.configure()?;
    configuration.func(step);
    if edit {
        configuration.edit(params)?;
    } else {
        configuration.add_param(params)?;
    }
    configuration.save()?;
    success_message!("Parameters of {} saved to {}", step, configuration.configfile.display());
    Ok(())
}

/// YAML scalar syntax, so `3` is an int and `true` a bool; empty stays an empty string.
fn parse_param_value(raw: &str) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::from(""));
    }
    match load_yaml_str(raw)? {
        Some(doc) => yaml_to_value(&doc),
        None => Ok(Value::Null),
    }
}
