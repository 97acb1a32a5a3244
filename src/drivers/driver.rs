//! # Driver contract.
//!
//! `start` either refuses the task (driver failure) or hands back a future that
//! resolves when the task exits. The future must observe the provided
//! [`CancellationToken`] and exit promptly once it fires; if it does not, the
//! runner drops it after the kill timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::model::TaskDef;

/// Boxed future returned by [`Driver::start`].
///
/// `Ok(())` means exit code 0; `Err(TaskError::Canceled)` means the task honored
/// its kill signal.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Shared handle to a driver.
pub type DriverRef = Arc<dyn Driver>;

/// # Execution backend.
///
/// # Example
/// ```
/// use allocvisor::{BoxTaskFuture, Driver, TaskDef, TaskError};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
///
/// struct Noop;
///
/// #[async_trait]
/// impl Driver for Noop {
///     fn name(&self) -> &str { "noop" }
///
///     async fn start(&self, _task: &TaskDef, _kill: CancellationToken) -> Result<BoxTaskFuture, TaskError> {
///         Ok(Box::pin(async { Ok(()) }))
///     }
/// }
/// ```
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Stable driver name (for logs).
    fn name(&self) -> &str;

    /// Starts one execution of `task`.
    async fn start(&self, task: &TaskDef, kill: CancellationToken) -> Result<BoxTaskFuture, TaskError>;
}
