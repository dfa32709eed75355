//! Process-wide registries of pipeline steps, validators and the validator hooks
//! bound before and after each step.
mod function;
pub mod script;
mod value;

pub use function::{Callable, FunctionRef};
pub use value::{params, Params, Value};

use crate::livelog;
use crate::livelog::Level;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const FUNCTION_KEY: &str = "function";
pub const FUNCTIONS_KEY: &str = "functions";
pub const DESC_KEY: &str = "desc";

/// The process-wide registry that project scripts and [`crate::plugins`] register into.
pub static REGISTRY: LazyLock<SharedRegistry> = LazyLock::new(SharedRegistry::default);

/// Entries of one category, keyed by step or validator name.
pub type Entries = BTreeMap<String, Params>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Registered,
    Validators,
    ValidateBefore,
    ValidateAfter,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Registered,
        Category::Validators,
        Category::ValidateBefore,
        Category::ValidateAfter,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Category::Registered => "REGISTERED",
            Category::Validators => "VALIDATORS",
            Category::ValidateBefore => "VALIDATE_BEFORE",
            Category::ValidateAfter => "VALIDATE_AFTER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.key() == input)
            .with_context(|| format!("unknown registry category '{input}'"))
    }
}

/// Whether a parameter key holds function references (`function`, `functions`,
/// `cleanup_function`, ...).
pub fn is_function_key(key: &str) -> bool {
    key.contains(FUNCTION_KEY)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    registered: Entries,
    validators: Entries,
    validate_before: Entries,
    validate_after: Entries,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self, category: Category) -> &Entries {
        match category {
            Category::Registered => &self.registered,
            Category::Validators => &self.validators,
            Category::ValidateBefore => &self.validate_before,
            Category::ValidateAfter => &self.validate_after,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut Entries {
        match category {
            Category::Registered => &mut self.registered,
            Category::Validators => &mut self.validators,
            Category::ValidateBefore => &mut self.validate_before,
            Category::ValidateAfter => &mut self.validate_after,
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &Entries)> {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.category(category)))
    }

    pub fn is_empty(&self) -> bool {
        self.categories().all(|(_, entries)| entries.is_empty())
    }

    pub fn clear(&mut self) {
        for category in Category::ALL {
            self.category_mut(category).clear();
            livelog!("{category} cleared!");
        }
    }

    pub fn register_step(&mut self, name: &str, params: Params, body: FunctionRef) {
        self.insert_function(Category::Registered, name, params, body);
    }

    pub fn register_validator(&mut self, name: &str, params: Params, body: FunctionRef) {
        self.insert_function(Category::Validators, name, params, body);
    }

    fn insert_function(
        &mut self,
        category: Category,
        name: &str,
        mut params: Params,
        body: FunctionRef,
    ) {
        params.entry(DESC_KEY.to_string()).or_insert_with(|| Value::from(""));
        params.insert(FUNCTION_KEY.to_string(), Value::Func(body));
        let replaced = self.category_mut(category).insert(name.to_string(), params);
        if replaced.is_some() {
            livelog!(level: Level::Warn, "{name} was already in {category}, replaced");
        }
    }

    pub fn step_names(&self) -> Vec<String> {
        self.registered.keys().cloned().collect()
    }

    pub fn validator_names(&self) -> Vec<String> {
        self.validators.keys().cloned().collect()
    }

    /// Every function reference held under a function key, keyed by name.
    pub fn function_refs(&self) -> BTreeMap<String, FunctionRef> {
        let mut refs = BTreeMap::new();
        for (_, entries) in self.categories() {
            for params in entries.values() {
                for (key, value) in params {
                    if !is_function_key(key) {
                        continue;
                    }
                    match value {
                        Value::Func(func) => {
                            refs.insert(func.name().to_string(), func.clone());
                        }
                        Value::List(items) => {
                            for func in items.iter().filter_map(Value::as_func) {
                                refs.insert(func.name().to_string(), func.clone());
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        refs
    }

    /// Validators bound to `step` in a hook category, in binding order.
    pub fn hooks(&self, category: Category, step: &str) -> Vec<FunctionRef> {
        self.category(category)
            .get(step)
            .and_then(|entry| entry.get(FUNCTIONS_KEY))
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_func).cloned().collect())
            .unwrap_or_default()
    }

    /// Runs the validators bound before `step`, the step itself, then the validators
    /// bound after it. The step receives its non-function params.
    pub fn run_step(&self, step: &str) -> Result<Value> {
        let entry = self
            .registered
            .get(step)
            .with_context(|| format!("step '{step}' is not registered"))?;
        let body = entry
            .get(FUNCTION_KEY)
            .and_then(Value::as_func)
            .with_context(|| format!("step '{step}' has no bound function"))?;
        let step_params: Params = entry
            .iter()
            .filter(|(key, _)| !is_function_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.run_validators(Category::ValidateBefore, step, &step_params)?;
        livelog!("running {step}");
        let output = body
            .call(&step_params)
            .with_context(|| format!("step '{step}' failed"))?;
        self.run_validators(Category::ValidateAfter, step, &step_params)?;
        livelog!("{step} finished: {output}");
        Ok(output)
    }

    /// Like [`Registry::hooks`], but a bound name that never resolved to a loaded
    /// validator is an error instead of being skipped.
    fn bound_validators(&self, category: Category, step: &str) -> Result<Vec<FunctionRef>> {
        let Some(items) = self
            .category(category)
            .get(step)
            .and_then(|entry| entry.get(FUNCTIONS_KEY))
            .and_then(Value::as_list)
        else {
            return Ok(Vec::new());
        };
        let mut bound = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Func(function) => bound.push(function.clone()),
                Value::Str(name) => {
                    bail!("validator '{name}' bound {category} '{step}' is not loaded")
                }
                other => bail!("invalid validator binding {other} for {category} '{step}'"),
            }
        }
        Ok(bound)
    }

    fn run_validators(&self, category: Category, step: &str, step_params: &Params) -> Result<()> {
        for validator in self.bound_validators(category, step)? {
            let mut params = self
                .validators
                .get(validator.name())
                .map(|entry| {
                    entry
                        .iter()
                        .filter(|(key, _)| !is_function_key(key))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect::<Params>()
                })
                .unwrap_or_default();
            for (key, value) in step_params {
                params.entry(key.clone()).or_insert_with(|| value.clone());
            }
            let verdict = validator
                .call(&params)
                .with_context(|| format!("validator '{}' failed to run", validator.name()))?;
            if !verdict.is_truthy() {
                livelog!(level: Level::Warn, "{} rejected {step} ({category})", validator.name());
                bail!(
                    "validator '{}' rejected step '{}' ({})",
                    validator.name(),
                    step,
                    category
                );
            }
        }
        Ok(())
    }
}

/// Cloneable handle to a [`Registry`] shared between projects and configurations.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry(Arc<RwLock<Registry>>);

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        SharedRegistry(Arc::new(RwLock::new(registry)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
