//! Bait request rendering and the first-chunk decision.
//!
//! The client -> backend relay calls [`first_chunk_disposition`] exactly once
//! per connection, on the first chunk it reads. The common answer is
//! [`ChunkDisposition::PassThrough`]; the interesting one swaps the outbound
//! request for a synthetic `GET /phishing.<ext>` so that blacklisted referers
//! can be served an alternate resource through the normal client -> server
//! pipeline (the request can still run through varnish, nginx, etc.).

use bytes::Bytes;

use crate::blacklist::Blacklist;
use crate::scan::{file_extension, parse_request_head};

/// Extension used when the request URI carries none.
pub const FALLBACK_EXTENSION: &[u8] = b"html";

/// What the relay should do with the first chunk read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// Relay the client's bytes untouched.
    PassThrough,
    /// Send these bytes to the backend instead of the client's request.
    Rewrite(Bytes),
    /// The rewritten request would not fit in a relay buffer; abandon the
    /// client without writing anything to the backend.
    Oversize,
}

/// Render the synthetic request sent in place of a blacklisted client's own.
///
/// The wire format is fixed:
/// `GET /phishing.<ext> HTTP/1.1\r\nHost: <host>\r\n\r\n`.
/// Returns `None` when the rendering would exceed `cap` bytes.
pub fn render_bait_request(ext: &[u8], host: &[u8], cap: usize) -> Option<Bytes> {
    let mut out = Vec::with_capacity(ext.len() + host.len() + 36);
    out.extend_from_slice(b"GET /phishing.");
    out.extend_from_slice(ext);
    out.extend_from_slice(b" HTTP/1.1\r\nHost: ");
    out.extend_from_slice(host);
    out.extend_from_slice(b"\r\n\r\n");
    (out.len() <= cap).then(|| Bytes::from(out))
}

/// Decide what to forward for the first chunk of a client request.
///
/// Rewriting requires a scannable request line plus non-empty URI, `Host`,
/// and `Referer` values, and the oracle flagging the referer. Malformed or
/// odd requests simply pass through; given the tool's purpose that is the
/// right call, and it keeps the hot path cheap.
pub fn first_chunk_disposition(
    chunk: &[u8],
    blacklist: &dyn Blacklist,
    cap: usize,
) -> ChunkDisposition {
    let Some(head) = parse_request_head(chunk) else {
        return ChunkDisposition::PassThrough;
    };
    let (Some(uri), Some(host), Some(referer)) = (head.request_uri, head.host, head.referer)
    else {
        return ChunkDisposition::PassThrough;
    };
    if uri.is_empty() || host.is_empty() || referer.is_empty() {
        return ChunkDisposition::PassThrough;
    }

    if !blacklist.is_blacklisted(referer) {
        return ChunkDisposition::PassThrough;
    }

    let ext = file_extension(uri).unwrap_or(FALLBACK_EXTENSION);
    match render_bait_request(ext, host, cap) {
        Some(request) => {
            tracing::debug!(
                uri = %String::from_utf8_lossy(uri),
                referer = %String::from_utf8_lossy(referer),
                "substituting bait request for blacklisted referer"
            );
            ChunkDisposition::Rewrite(request)
        }
        None => ChunkDisposition::Oversize,
    }
}
