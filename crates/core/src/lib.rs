//! Phishbait Core - hot path logic for referer-based request rewriting
//!
//! This crate contains the per-request code paths shared by the relay engine.
//!
//! # Invariants
//!
//! 1. NO allocation while scanning a request head
//! 2. NO panic on user input
//! 3. Scanning never mutates the input buffer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod bait;
pub mod blacklist;
pub mod error;
pub mod scan;

pub use bait::{first_chunk_disposition, render_bait_request, ChunkDisposition};
pub use blacklist::{Blacklist, HostSuffixBlacklist};
pub use error::{classify_stream_error, ProxyError, StreamErrorKind};
pub use scan::{file_extension, parse_request_head, RequestHead};

/// Capacity of each relay data buffer, and the ceiling for a rendered bait
/// request. A request whose rewritten form would not fit is abandoned rather
/// than truncated.
pub const READ_BUFFER_SIZE: usize = 4096;
