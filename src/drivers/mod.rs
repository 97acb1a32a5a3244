//! # Execution backends.
//!
//! A [`Driver`] turns a [`TaskDef`](crate::TaskDef) into a running future.
//! The task runner owns that future: it races it against the kill signal and
//! aborts it when the kill timeout is exceeded.
//!
//! - [`Driver`] the backend contract
//! - [`DriverFn`] closure-backed driver, handy for embedding and tests
//! - [`MockDriver`] config-driven driver that records starts and kills

mod driver;
mod driver_fn;
mod mock;

pub use driver::{BoxTaskFuture, Driver, DriverRef};
pub use driver_fn::DriverFn;
pub use mock::{MockDriver, MockTaskConfig};
