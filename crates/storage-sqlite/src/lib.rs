//! SQLite-backed persistent store for the offline sync subsystem.
//!
//! Implements [`receiptwise_core::store::SyncStore`] on top of a local
//! SQLite database holding three namespaces: the pending-action list,
//! cached GET responses, and denormalized entity snapshots.

mod store;

pub use store::SqliteSyncStore;
