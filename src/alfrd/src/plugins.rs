//! Registration calls for pipeline code written in Rust. They are the in-process
//! counterpart of the `@register` / `@validator` script directives.
//!
//! ```no_run
//! use alfrd::plugins;
//! use alfrd::registry::Value;
//!
//! plugins::register("registered_pyt", "testing register func", |params| {
//!     let name = params.get("name").map(Value::to_plain_string).unwrap_or_default();
//!     Ok(Value::from(format!("hello {name}")))
//! });
//! ```
use crate::registry::{FunctionRef, Params, Value, DESC_KEY, REGISTRY};
use anyhow::Result;

/// Registers a step into the global registry and returns its function reference.
pub fn register<F>(name: &str, desc: &str, body: F) -> FunctionRef
where
    F: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
{
    register_with(name, Params::from([(DESC_KEY.to_string(), Value::from(desc))]), body)
}

/// Like [`register`], with extra default parameters for the step.
pub fn register_with<F>(name: &str, params: Params, body: F) -> FunctionRef
where
    F: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
{
    let function = FunctionRef::new(name, body);
    REGISTRY
        .write()
        .register_step(name, params, function.clone());
    function
}

/// Registers a validator into the global registry.
pub fn validator<F>(name: &str, body: F) -> FunctionRef
where
    F: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
{
    let function = FunctionRef::new(name, body);
    REGISTRY
        .write()
        .register_validator(name, Params::new(), function.clone());
    function
}
