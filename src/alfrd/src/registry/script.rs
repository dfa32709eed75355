//! Registration directives embedded in project scripts.
//!
//! A script registers itself by carrying comment lines such as
//!
//! ```text
//! # @register(desc="trim adapters", quality=20)
//! # @alfrd.validator(name=non_empty)
//! ```
//!
//! Every directive becomes a registry entry whose function runs the script.
use super::{Callable, FunctionRef, Params, Registry, Value, DESC_KEY};
use crate::constants::{PARAM_ENV_PREFIX, STEP_ENV};
use crate::livelog;
use crate::livelog::Level;
use crate::project::yaml::yaml_to_value;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use yaml_rust2::YamlLoader;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#|//|--)\s*@(?:alfrd\.)?(register|validator)\b\s*(?:\((.*)\))?\s*$")
        .expect("directive regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Step,
    Validator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub name: String,
    pub params: Params,
    pub line: usize,
}

/// Parses every directive of a script. `default_name` (usually the file stem) is
/// used when a directive has no `name=` argument.
pub fn parse_directives(source: &str, default_name: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let Some(captures) = DIRECTIVE.captures(line) else {
            continue;
        };
        let kind = match &captures[1] {
            "register" => DirectiveKind::Step,
            _ => DirectiveKind::Validator,
        };
        let mut params = match captures.get(2) {
            Some(args) => parse_arguments(args.as_str())
                .with_context(|| format!("invalid directive on line {}", idx + 1))?,
            None => Params::new(),
        };
        let name = match params.remove("name") {
            Some(Value::Str(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(other) if other != Value::Null => other.to_plain_string(),
            _ => default_name.to_string(),
        };
        directives.push(Directive {
            kind,
            name,
            params,
            line: idx + 1,
        });
    }
    Ok(directives)
}

fn parse_arguments(args: &str) -> Result<Params> {
    let mut params = Params::new();
    for argument in split_arguments(args)? {
        let argument = argument.trim();
        if argument.is_empty() {
            continue;
        }
        let (key, raw) = argument
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{argument}'"))?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            bail!("invalid parameter name '{key}'");
        }
        params.insert(key.to_string(), parse_scalar(raw.trim())?);
    }
    Ok(params)
}

/// Splits on commas that are not inside quotes.
fn split_arguments(args: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in args.chars() {
        match (quote, c) {
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (None, ',') => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if quote.is_some() {
        bail!("unterminated quote in '{args}'");
    }
    parts.push(current);
    Ok(parts)
}

fn parse_scalar(raw: &str) -> Result<Value> {
    for q in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return Ok(Value::Str(raw[1..raw.len() - 1].to_string()));
        }
    }
    if raw.is_empty() {
        return Ok(Value::Str(String::new()));
    }
    let docs = YamlLoader::load_from_str(raw).with_context(|| format!("invalid value '{raw}'"))?;
    match docs.into_iter().next() {
        Some(doc) => yaml_to_value(&doc),
        None => Ok(Value::Null),
    }
}

/// Runs a project script as a step or a validator.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub name: String,
    pub path: PathBuf,
    pub kind: DirectiveKind,
}

impl ScriptStep {
    fn command(&self, params: &Params) -> Command {
        let mut command = Command::new(&self.path);
        if let Some(dir) = self.path.parent() {
            command.current_dir(dir);
        }
        command.env(STEP_ENV, &self.name);
        for (key, value) in params {
            command.env(
                format!("{PARAM_ENV_PREFIX}{}", key.to_uppercase()),
                value.to_plain_string(),
            );
        }
        command
    }
}

impl Callable for ScriptStep {
    fn call(&self, params: &Params) -> Result<Value> {
        let output = self
            .command(params)
            .output()
            .with_context(|| format!("failed to execute {}", self.path.display()))?;
        match self.kind {
            DirectiveKind::Validator => Ok(Value::Bool(output.status.success())),
            DirectiveKind::Step if output.status.success() => Ok(Value::Str(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            DirectiveKind::Step => bail!(
                "{} exited with {}: {}",
                self.path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

/// Reads `path`, registers each of its directives and returns how many were found.
/// Files that are not UTF-8 text carry no directives and are skipped.
pub fn register_script(registry: &mut Registry, path: &Path) -> Result<usize> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let Ok(source) = String::from_utf8(bytes) else {
        livelog!(level: Level::Debug, "skipping {}: not a text file", path.display());
        return Ok(0);
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let directives = parse_directives(&source, &stem)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    for directive in &directives {
        let step = ScriptStep {
            name: directive.name.clone(),
            path: path.to_path_buf(),
            kind: directive.kind,
        };
        let mut params = directive.params.clone();
        params
            .entry(DESC_KEY.to_string())
            .or_insert_with(|| Value::from(""));
        let body = FunctionRef::from_callable(&directive.name, step);
        match directive.kind {
            DirectiveKind::Step => registry.register_step(&directive.name, params, body),
            DirectiveKind::Validator => registry.register_validator(&directive.name, params, body),
        }
    }
    Ok(directives.len())
}
