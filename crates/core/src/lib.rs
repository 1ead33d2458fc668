//! Offline-first synchronization core for the Receiptwise apps.
//!
//! This crate owns the client-side sync subsystem: the pending-action queue,
//! the drain engine, the offline-aware request router, and the sync status
//! publisher. Durable storage and HTTP transport are injected through the
//! [`store::SyncStore`] and [`transport::Transport`] traits so every caller
//! (and every test) can wire its own collaborators.

pub mod connectivity;
pub mod errors;
pub mod store;
pub mod sync;
pub mod transport;

pub use errors::{Error, Result};
pub use sync::OfflineSyncService;
