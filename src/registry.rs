//! Server-side data function registry.
//!
//! A compiled page module cannot carry executable code the way a bundled
//! JS module does, so pages name their data function and the application
//! registers the implementations here at startup. The loader's `data_fn`
//! field is the link: a page module naming a function that was never
//! registered is treated as a broken module.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::PageContext;
use crate::server::ResponseParts;

/// Outcome of a data function: the response produced by exactly one
/// context operation, or an error for the terminal error handler.
pub type DataFnResult = anyhow::Result<ResponseParts>;

/// A registered server-side data function.
pub type DataFn = Arc<dyn Fn(PageContext) -> DataFnResult + Send + Sync>;

/// Name to data-function mapping, built once at startup.
#[derive(Default, Clone)]
pub struct DataFnRegistry {
    fns: HashMap<String, DataFn>,
}

impl DataFnRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data function under the name page modules refer to it
    /// by. Re-registering a name replaces the previous function.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(PageContext) -> DataFnResult + Send + Sync + 'static,
    {
        self.fns.insert(name.into(), Arc::new(f));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<DataFn> {
        self.fns.get(name).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
