//! Phishbait Server - listener, backend connect, and the relay engine
//!
//! Built on tokio's current-thread runtime: one OS thread multiplexes every
//! connection, and handlers yield only at readiness boundaries.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod listener;
pub mod relay;
pub mod resolve;
pub mod server;

pub use relay::run_session;
pub use resolve::resolve_backend;
pub use server::{connect_backend, ProxyConfig, ProxyServer};
