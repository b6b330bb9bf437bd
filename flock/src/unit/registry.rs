use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use flock_api::function::JobFunction;
use flock_api::protocol::{UnitReply, UnitRequest};

/// Named job functions an execution unit can run.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn JobFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F: JobFunction>(mut self, function: F) -> Self {
        self.register(function);
        self
    }

    /// Registers `function` under its own name, returning the function it
    /// replaced.
    pub fn register<F: JobFunction>(&mut self, function: F) -> Option<Arc<dyn JobFunction>> {
        self.register_shared(Arc::new(function))
    }

    pub fn register_shared(&mut self, function: Arc<dyn JobFunction>) -> Option<Arc<dyn JobFunction>> {
        let name = function.name().to_string();
        let previous = self.functions.insert(name.clone(), function);
        if previous.is_some() {
            warn!(function = %name, "Job function registered twice, previous one replaced");
        }
        previous
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Runs the requested function and builds the reply for it.
    ///
    /// Unknown names reply *not found*. A panicking function replies with an
    /// application error carrying the panic message.
    pub async fn execute(&self, request: UnitRequest) -> UnitReply {
        let UnitRequest { id, data } = request;

        let Some(function) = self.functions.get(&data.name).cloned() else {
            debug!(job = %id, function = %data.name, "Function not registered");
            return UnitReply::not_found(id);
        };

        match AssertUnwindSafe(function.call(data.args)).catch_unwind().await {
            Ok(Ok(value)) => UnitReply::success(id, value),
            Ok(Err(message)) => UnitReply::failure(id, message),
            Err(panic) => {
                let message = panic_message(panic);
                warn!(job = %id, function = %data.name, "Job function panicked: {}", message);
                UnitReply::failure(id, format!("{} panicked: {}", data.name, message))
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
