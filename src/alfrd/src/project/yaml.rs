use crate::registry::{Params, Value};
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;
use yaml_rust2::yaml::Hash;
use yaml_rust2::{YamlEmitter, YamlLoader};
// re-export Yaml for convenience
pub use yaml_rust2::Yaml;

/// Loads the first document of a YAML file. An empty file yields `None`.
pub fn load_yaml_file<P: AsRef<Path>>(path: P) -> Result<Option<Yaml>> {
    let yaml_str = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
    load_yaml_str(&yaml_str)
}

pub fn load_yaml_str(yaml_str: &str) -> Result<Option<Yaml>> {
    let docs = YamlLoader::load_from_str(yaml_str)?;
    Ok(docs.into_iter().next().filter(|doc| !doc.is_null()))
}

pub fn dump_yaml(doc: &Yaml) -> Result<String> {
    let mut out = String::new();
    YamlEmitter::new(&mut out)
        .dump(doc)
        .map_err(|e| anyhow!("failed to emit YAML: {e:?}"))?;
    out.push('\n');
    Ok(out)
}

pub fn yaml_to_value(yaml: &Yaml) -> Result<Value> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(*b),
        Yaml::Integer(i) => Value::Int(*i),
        Yaml::Real(raw) => Value::Float(
            yaml.as_f64()
                .with_context(|| format!("invalid float '{raw}'"))?,
        ),
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Array(items) => Value::List(items.iter().map(yaml_to_value).collect::<Result<_>>()?),
        Yaml::Hash(hash) => Value::Map(yaml_to_params(hash)?),
        Yaml::Alias(_) => bail!("YAML aliases are not supported"),
        Yaml::BadValue => bail!("invalid YAML value"),
    })
}

pub fn yaml_to_params(hash: &Hash) -> Result<Params> {
    hash.iter()
        .map(|(key, value)| Ok((yaml_key(key)?, yaml_to_value(value)?)))
        .collect()
}

/// Mapping keys are read as strings; scalar keys such as `1` or `true` keep their text.
pub fn yaml_key(key: &Yaml) -> Result<String> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s.clone()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => bail!("Expected a scalar mapping key"),
    }
}

/// Function references are written as their names.
pub fn value_to_yaml(value: &Value) -> Yaml {
    match value {
        Value::Null => Yaml::Null,
        Value::Bool(b) => Yaml::Boolean(*b),
        Value::Int(i) => Yaml::Integer(*i),
        Value::Float(f) => Yaml::Real(format_float(*f)),
        Value::Str(s) => string_scalar(s),
        Value::List(items) => Yaml::Array(items.iter().map(value_to_yaml).collect()),
        Value::Map(map) => params_to_yaml(map),
        Value::Func(func) => string_scalar(func.name()),
    }
}

pub fn params_to_yaml(params: &Params) -> Yaml {
    let mut hash = Hash::new();
    for (key, value) in params {
        hash.insert(string_scalar(key), value_to_yaml(value));
    }
    Yaml::Hash(hash)
}

/// A string for the emitter. Text the loader would resolve to another type when
/// written plain, such as `0o17` or `+5`, is handed over already double-quoted;
/// the emitter writes `Real` scalars verbatim.
pub fn string_scalar(s: &str) -> Yaml {
    match Yaml::from_str(s) {
        Yaml::String(_) => Yaml::String(s.to_string()),
        _ => Yaml::Real(format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        // keep the decimal point so the value reloads as a float
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

pub trait YamlExt {
    fn optional_hash(&self, key: &str) -> Result<Option<&Hash>>;
}

impl YamlExt for Yaml {
    fn optional_hash(&self, key: &str) -> Result<Option<&Hash>> {
        match &self[key] {
            Yaml::Hash(hash) => Ok(Some(hash)),
            Yaml::BadValue | Yaml::Null => Ok(None),
            _ => bail!("Expected {} to be a mapping", key),
        }
    }
}
