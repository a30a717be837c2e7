//! The per-client relay engine.
//!
//! Each session runs two directional pumps over a pair of sockets: one
//! shuttles client bytes to the backend (scanning the first chunk for a
//! blacklisted referer), the other shuttles backend bytes to the client.
//! A pump alternates strictly between filling its buffer from the source
//! and draining it to the sink, so each direction has exactly one buffer
//! in flight and the drain boundary is the unit of backpressure.
//!
//! Teardown discipline: a pump that finishes cleanly shuts down its write
//! side, half-closing its direction while the other keeps draining. The
//! exception is a direction whose source never produced a byte - there is
//! no useful work in flight, so the whole session is dropped at once.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use phishbait_core::{
    classify_stream_error, first_chunk_disposition, Blacklist, ChunkDisposition, StreamErrorKind,
};

/// Why a directional pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpEnd {
    /// The source reached end-of-stream after at least one read produced
    /// bytes.
    SourceClosed,
    /// The source closed or failed before ever producing a byte. Nothing
    /// has flowed, so the peer direction is torn down as well.
    Stillborn,
    /// A hard error ended this direction mid-stream.
    Failed,
    /// The bait request is on the wire; this direction's purpose is met.
    BaitDelivered,
}

/// Relay bytes between an accepted client and its freshly connected
/// backend until both directions have finished.
pub async fn run_session(
    client: TcpStream,
    backend: TcpStream,
    blacklist: Arc<dyn Blacklist>,
    buffer_size: usize,
) {
    let _ = client.set_nodelay(true);
    let _ = backend.set_nodelay(true);

    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let upstream =
        pump_client_to_backend(client_read, backend_write, blacklist.as_ref(), buffer_size);
    let downstream = pump_backend_to_client(backend_read, client_write, buffer_size);
    tokio::pin!(upstream, downstream);

    // Whichever direction finishes first decides the other's fate: normally
    // the survivor keeps draining until its own source closes, but a
    // stillborn direction takes the whole session down with it.
    tokio::select! {
        end = &mut upstream => {
            if end != PumpEnd::Stillborn {
                let _ = downstream.await;
            }
        }
        _ = &mut downstream => {
            let _ = upstream.await;
        }
    }
}

/// Client -> backend direction, including the first-chunk rewrite hook.
async fn pump_client_to_backend<R, W>(
    mut src: R,
    mut dst: W,
    blacklist: &dyn Blacklist,
    buffer_size: usize,
) -> PumpEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut first_read = true;

    loop {
        let bytes_read = match src.read(&mut buffer).await {
            Ok(0) => {
                if first_read {
                    return PumpEnd::Stillborn;
                }
                // Pass the end of the stream on so the backend sees FIN
                // now rather than at full teardown.
                let _ = dst.shutdown().await;
                return PumpEnd::SourceClosed;
            }
            Ok(n) => n,
            Err(err) => {
                let kind = classify_stream_error(&err);
                debug_assert!(
                    kind != StreamErrorKind::WouldBlock,
                    "readiness-driven read returned EAGAIN"
                );
                // Resets from the client are routine; anything else is worth a line.
                if !matches!(kind, StreamErrorKind::PeerReset | StreamErrorKind::BrokenPipe) {
                    tracing::warn!("failed to read data from client: {err}");
                }
                return if first_read { PumpEnd::Stillborn } else { PumpEnd::Failed };
            }
        };

        let mut bait = None;
        if first_read {
            first_read = false;
            match first_chunk_disposition(&buffer[..bytes_read], blacklist, buffer_size) {
                ChunkDisposition::PassThrough => {}
                ChunkDisposition::Rewrite(request) => bait = Some(request),
                ChunkDisposition::Oversize => {
                    tracing::warn!("bait request exceeds relay buffer; dropping client");
                    return PumpEnd::Stillborn;
                }
            }
        }

        let chunk = match &bait {
            Some(request) => &request[..],
            None => &buffer[..bytes_read],
        };
        // By the time a write is attempted a read has produced bytes, so a
        // write failure only ends this direction, never the whole session.
        if let Err(err) = dst.write_all(chunk).await {
            log_write_error(&err, "backend");
            return PumpEnd::Failed;
        }

        if bait.is_some() {
            // A rewritten request is one-shot: its purpose is met the
            // instant the synthetic request is on the wire.
            let _ = dst.shutdown().await;
            return PumpEnd::BaitDelivered;
        }
    }
}

/// Backend -> client direction.
async fn pump_backend_to_client<R, W>(mut src: R, mut dst: W, buffer_size: usize) -> PumpEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let bytes_read = match src.read(&mut buffer).await {
            Ok(0) => {
                let _ = dst.shutdown().await;
                return PumpEnd::SourceClosed;
            }
            Ok(n) => n,
            Err(err) => {
                debug_assert!(
                    classify_stream_error(&err) != StreamErrorKind::WouldBlock,
                    "readiness-driven read returned EAGAIN"
                );
                tracing::warn!("failed to read data from backend: {err}");
                return PumpEnd::Failed;
            }
        };

        if let Err(err) = dst.write_all(&buffer[..bytes_read]).await {
            log_write_error(&err, "client");
            return PumpEnd::Failed;
        }
    }
}

fn log_write_error(err: &io::Error, peer: &'static str) {
    match classify_stream_error(err) {
        StreamErrorKind::PeerReset | StreamErrorKind::BrokenPipe => {
            tracing::warn!("failed to write data to {peer}: broken connection");
        }
        // A known-benign macOS kernel quirk on writes to a closing socket.
        StreamErrorKind::PlatformQuirk => {}
        kind => {
            debug_assert!(
                kind != StreamErrorKind::WouldBlock,
                "readiness-driven write returned EAGAIN"
            );
            tracing::warn!("failed to write data to {peer}: {err}");
        }
    }
}
