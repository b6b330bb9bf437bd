//! # Job Functions
//!
//! A job function is the unit-side body behind a function name. Implement
//! [`JobFunction`] directly, build one from a closure with [`job_fn`], or
//! annotate a plain Rust function with `#[job]`.
//!
//! ```rust
//! use flock_api::function::{job_fn, JobFunction};
//! use serde_json::{json, Value};
//!
//! let add = job_fn("add", |args: Value| async move {
//!     let one = args["one"].as_i64().ok_or("missing one")?;
//!     let two = args["two"].as_i64().ok_or("missing two")?;
//!     Ok::<Value, String>(json!(one + two))
//! });
//! assert_eq!(add.name(), "add");
//! ```

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A function an execution unit can run by name.
#[async_trait]
pub trait JobFunction: Send + Sync + 'static {
    /// Name callers use to address this function.
    fn name(&self) -> &str;

    /// Runs the function. `Err` carries the application error message.
    async fn call(&self, args: Value) -> Result<Value, String>;
}

/// Closure-backed [`JobFunction`], see [`job_fn`].
pub struct FnJob<F> {
    name: String,
    body: F,
}

impl<F> fmt::Debug for FnJob<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJob").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> JobFunction for FnJob<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, args: Value) -> Result<Value, String> {
        (self.body)(args).await
    }
}

/// Wraps an async closure as a named job function.
pub fn job_fn<F, Fut>(name: impl Into<String>, body: F) -> FnJob<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    FnJob {
        name: name.into(),
        body,
    }
}

/// Decodes wire arguments into the type a function expects.
pub fn decode_args<T: DeserializeOwned>(name: &str, args: Value) -> Result<T, String> {
    serde_json::from_value(args)
        .map_err(|e| format!("invalid arguments for {}: {}", name, e))
}

/// Encodes a function's return value for the wire.
pub fn encode_output<T: Serialize>(name: &str, output: T) -> Result<Value, String> {
    serde_json::to_value(output)
        .map_err(|e| format!("failed to encode result of {}: {}", name, e))
}
