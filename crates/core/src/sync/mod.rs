//! Offline sync domain models and services.

mod action;
mod engine;
mod monitor;
mod queue;
mod router;
mod service;
mod status;

pub use action::*;
pub use engine::*;
pub use monitor::*;
pub use queue::*;
pub use router::*;
pub use service::*;
pub use status::*;

#[cfg(test)]
pub(crate) mod testing;
