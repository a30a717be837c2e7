//! Accept loop and backend connection establishment.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use phishbait_core::error::Result;
use phishbait_core::{Blacklist, READ_BUFFER_SIZE};

use crate::listener::create_listen_socket;
use crate::relay::run_session;

/// Tunables for a proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Port to accept client connections on. Port 0 picks an ephemeral port.
    pub listen_port: u16,
    /// Accept queue backlog handed to `listen(2)`. What this value 'should'
    /// be seems to be controversial; under medium load too small a value
    /// shows up as clients seeing connection resets.
    pub queue_backlog: i32,
    /// Capacity of each per-direction relay buffer.
    pub read_buffer_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: 3080,
            queue_backlog: 128,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

/// The accepting proxy: owns the listen socket, the resolved backend
/// candidate list, and the blacklist oracle shared by all sessions.
pub struct ProxyServer {
    listener: TcpListener,
    candidates: Arc<Vec<SocketAddr>>,
    blacklist: Arc<dyn Blacklist>,
    read_buffer_size: usize,
    active_sessions: Arc<AtomicU64>,
}

impl ProxyServer {
    /// Bind the listen socket and assemble a server ready to run.
    pub fn bind(
        config: &ProxyConfig,
        candidates: Vec<SocketAddr>,
        blacklist: Arc<dyn Blacklist>,
    ) -> Result<Self> {
        let listener = create_listen_socket(config.listen_port, config.queue_backlog)?;
        let listener = TcpListener::from_std(listener)?;
        Ok(Self {
            listener,
            candidates: Arc::new(candidates),
            blacklist,
            read_buffer_size: config.read_buffer_size,
            active_sessions: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The address the listen socket actually bound (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever, opening one backend connection per client
    /// and relaying until each session finishes.
    pub async fn run(self) -> Result<()> {
        loop {
            let client = match self.listener.accept().await {
                Ok((stream, _peer)) => stream,
                Err(err) => {
                    // Transient accept failures (out of fds, socket buffer
                    // memory) leave nothing to clean up; keep accepting.
                    if matches!(err.raw_os_error(), Some(libc::ENOBUFS | libc::ENOMEM)) {
                        tracing::warn!(
                            "failed to accept client connection: insufficient buffer memory"
                        );
                    } else {
                        tracing::warn!("failed to accept client connection: {err}");
                    }
                    continue;
                }
            };

            let candidates = Arc::clone(&self.candidates);
            let blacklist = Arc::clone(&self.blacklist);
            let active_sessions = Arc::clone(&self.active_sessions);
            let buffer_size = self.read_buffer_size;

            tokio::spawn(async move {
                // A client whose backend cannot be reached is dropped
                // without ever forming a session.
                let Some(backend) = connect_backend(&candidates).await else {
                    return;
                };

                let live = active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(sessions = live, "session started");

                run_session(client, backend, blacklist, buffer_size).await;

                let live = active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
                tracing::debug!(sessions = live, "session finished");
            });
        }
    }
}

/// Walk the backend candidate list left to right until one accepts a
/// connection. Per-candidate failures fall through to the next candidate;
/// `None` means the list is exhausted.
pub async fn connect_backend(candidates: &[SocketAddr]) -> Option<TcpStream> {
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Some(stream),
            Err(err) => {
                tracing::debug!(backend = %addr, "backend candidate refused: {err}");
            }
        }
    }
    None
}
