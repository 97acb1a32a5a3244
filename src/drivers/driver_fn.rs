//! # Function-backed driver (`DriverFn`)
//!
//! [`DriverFn`] wraps a closure `F: Fn(TaskDef, CancellationToken) -> Fut`,
//! producing a fresh future per start. Nothing is shared between restarts unless
//! the closure captures an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use allocvisor::{DriverFn, DriverRef, TaskDef, TaskError};
//!
//! let d: DriverRef = DriverFn::arc("inline", |_task: TaskDef, kill: CancellationToken| async move {
//!     kill.cancelled().await;
//!     Err::<(), _>(TaskError::Canceled)
//! });
//!
//! assert_eq!(d.name(), "inline");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::drivers::driver::{BoxTaskFuture, Driver};
use crate::error::TaskError;
use crate::model::TaskDef;

/// Function-backed driver implementation.
#[derive(Debug)]
pub struct DriverFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> DriverFn<F> {
    /// Creates a new function-backed driver.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the driver and returns it behind an `Arc`.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Driver for DriverFn<F>
where
    F: Fn(TaskDef, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, task: &TaskDef, kill: CancellationToken) -> Result<BoxTaskFuture, TaskError> {
        Ok(Box::pin((self.f)(task.clone(), kill)))
    }
}
