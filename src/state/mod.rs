//! # Durable allocation state.
//!
//! The runner persists the applied [`Allocation`](crate::Allocation) and every
//! [`TaskStateRecord`](crate::TaskStateRecord) through a [`StateStore`], and
//! reads them back on `restore`. Writes are best-effort: a failing store never
//! stalls the control loop.
//!
//! - [`StateStore`] the storage contract
//! - [`MemStore`] shared in-memory store (survives runner drop)
//! - [`FileStore`] JSON files, one directory per allocation

mod file;
mod mem;
mod store;

pub use file::FileStore;
pub use mem::MemStore;
pub use store::{StateStore, StoreRef};
