//! Backend address resolution.
//!
//! Resolution happens once at startup; the resulting candidate list is
//! assumed stable for the life of the process. Connect-time failures walk
//! the list instead of re-resolving.

use std::io;
use std::net::SocketAddr;

use tokio::net::lookup_host;

use phishbait_core::error::Result;
use phishbait_core::ProxyError;

/// Resolve the backend host and port to an ordered list of candidate
/// addresses (IPv4 and IPv6). An unresolvable backend is fatal: there is
/// nothing to forward to.
pub async fn resolve_backend(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ProxyError::Resolution {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(ProxyError::Resolution {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"),
        });
    }

    tracing::debug!(host, port, count = candidates.len(), "resolved backend candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_numeric_host() {
        let candidates = resolve_backend("127.0.0.1", 8080).await.unwrap();
        assert_eq!(candidates, vec!["127.0.0.1:8080".parse().unwrap()]);
    }

    #[tokio::test]
    async fn test_resolved_port_is_propagated() {
        let candidates = resolve_backend("127.0.0.1", 3080).await.unwrap();
        assert!(candidates.iter().all(|addr| addr.port() == 3080));
    }
}
