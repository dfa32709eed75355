use super::value::{Params, Value};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Anything a registry entry can call: native Rust closures or project scripts.
pub trait Callable: Send + Sync {
    fn call(&self, params: &Params) -> Result<Value>;
}

impl<F> Callable for F
where
    F: Fn(&Params) -> Result<Value> + Send + Sync,
{
    fn call(&self, params: &Params) -> Result<Value> {
        self(params)
    }
}

/// A named, cheaply cloneable handle to a [`Callable`].
///
/// Two references are equal when they carry the same name: the name is what gets
/// persisted, and it is what a loaded configuration is rebound by.
#[derive(Clone)]
pub struct FunctionRef {
    name: Arc<str>,
    body: Arc<dyn Callable>,
}

impl FunctionRef {
    pub fn new<F>(name: impl AsRef<str>, body: F) -> Self
    where
        F: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_callable(name, body)
    }

    pub fn from_callable<C: Callable + 'static>(name: impl AsRef<str>, body: C) -> Self {
        FunctionRef {
            name: Arc::from(name.as_ref()),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, params: &Params) -> Result<Value> {
        self.body.call(params)
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionRef").field(&self.name).finish()
    }
}
