//! HTTP transport for the offline sync subsystem, backed by reqwest.

mod client;

pub use client::HttpTransport;
