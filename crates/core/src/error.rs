//! Error types for Phishbait.
//!
//! Startup errors are fatal and propagate via `Result`; per-connection
//! stream errors are classified into [`StreamErrorKind`] so relay handlers
//! can switch on the variant instead of comparing raw OS codes.

use std::io;

use thiserror::Error;

/// Errors surfaced while bringing the proxy up or connecting backends.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Backend host resolution failed; nothing can be forwarded.
    #[error("failed to resolve backend host '{host}' on port {port}")]
    Resolution {
        /// The host that was being resolved.
        host: String,
        /// The port that was being resolved.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// The listen socket could not be created or bound.
    #[error("failed to bind listen socket on port {port}")]
    Bind {
        /// The requested listen port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The bound socket could not be marked listening.
    #[error("failed to listen on bound socket")]
    Listen(#[source] io::Error),

    /// Every resolved backend candidate was exhausted without a connection.
    #[error("no backend candidate accepted a connection")]
    NoBackendCandidate,

    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type alias using ProxyError
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Classification of a per-stream I/O error, driving log severity and
/// teardown behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// `ECONNRESET`: the peer reset the connection.
    PeerReset,
    /// `EPIPE`: the peer is gone.
    BrokenPipe,
    /// `EAGAIN`/`EWOULDBLOCK`. Never expected out of a readiness-driven
    /// read or write; seeing one indicates a logic bug.
    WouldBlock,
    /// `EPROTOTYPE`: a benign macOS kernel quirk observed on writes to a
    /// closing socket. Suppressed from logs.
    PlatformQuirk,
    /// Anything else.
    Other,
}

/// Classify an I/O error from a relay stream.
pub fn classify_stream_error(err: &io::Error) -> StreamErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionReset => StreamErrorKind::PeerReset,
        io::ErrorKind::BrokenPipe => StreamErrorKind::BrokenPipe,
        io::ErrorKind::WouldBlock => StreamErrorKind::WouldBlock,
        _ => {
            #[cfg(unix)]
            {
                if err.raw_os_error() == Some(libc::EPROTOTYPE) {
                    return StreamErrorKind::PlatformQuirk;
                }
            }
            StreamErrorKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stream_error() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_stream_error(&reset), StreamErrorKind::PeerReset);

        let pipe = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(classify_stream_error(&pipe), StreamErrorKind::BrokenPipe);

        let block = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(classify_stream_error(&block), StreamErrorKind::WouldBlock);

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(classify_stream_error(&other), StreamErrorKind::Other);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_platform_quirk() {
        let quirk = io::Error::from_raw_os_error(libc::EPROTOTYPE);
        assert_eq!(classify_stream_error(&quirk), StreamErrorKind::PlatformQuirk);
    }
}
