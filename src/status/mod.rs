//! # Status reporting.
//!
//! The runner pushes every material change of its [`AllocState`](crate::AllocState)
//! through a [`StatusPublisher`]: a `watch`-backed worker that forwards the
//! latest snapshot to a [`StatusUpdater`]. A slow updater only ever sees the
//! newest state; intermediate states are coalesced.
//!
//! ```text
//! control loop ── publish(state) ──► watch slot ──► worker ──► StatusUpdater::update
//!                 (never blocks)     (latest wins)
//! ```

mod publisher;
mod recording;
mod updater;

pub use publisher::StatusPublisher;
pub use recording::RecordingUpdater;
pub use updater::{NoopUpdater, StatusUpdater, UpdaterRef};
