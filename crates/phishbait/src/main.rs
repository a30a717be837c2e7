//! Phishbait - a reverse proxy for dealing with uninvited hotlinking.
//!
//! # Usage
//! ```bash
//! phishbait backend.example 80
//! phishbait backend.example 8080 -p 3080 -q 256 -b blacklist.txt
//! ```

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use phishbait_core::{Blacklist, HostSuffixBlacklist};
use phishbait_server::{resolve_backend, ProxyConfig, ProxyServer};

/// Phishbait - referer-aware TCP relay for hotlink defense
#[derive(Parser, Debug)]
#[command(name = "phishbait")]
#[command(version, about, long_about = None)]
struct Args {
    /// Host the proxied backend listens on
    backend_host: String,

    /// Port the proxied backend listens on
    backend_port: u16,

    /// Port to accept client connections on
    #[arg(short = 'p', long, default_value_t = 3080)]
    listen_port: u16,

    /// Accept queue backlog for the listen socket
    #[arg(short = 'q', long, default_value_t = 128, value_parser = parse_backlog)]
    queue_backlog: i32,

    /// File of blacklisted referer hosts, one per line
    #[arg(short = 'b', long)]
    blacklist: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_backlog(value: &str) -> std::result::Result<i32, String> {
    value
        .parse::<i32>()
        .ok()
        .filter(|backlog| *backlog > 0)
        .ok_or_else(|| "illegal queue backlog value".to_string())
}

/// Parse arguments with the exit codes callers script against: 1 for a
/// usage problem (including an explicit `-h`), 2 for a value that parsed
/// as the wrong thing.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::ValueValidation | ErrorKind::InvalidValue => 2,
                _ => 1,
            };
            let _ = err.print();
            exit(code);
        }
    }
}

// The relay is deliberately single-threaded: sessions are readiness-driven
// and cheap, so one thread multiplexes all of them.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args();
    init_logging(&args.log_level);

    let blacklist: Arc<dyn Blacklist> = match &args.blacklist {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read blacklist file {}", path.display()))?;
            let list = HostSuffixBlacklist::from_lines(&text);
            tracing::info!("loaded {} blacklist patterns from {}", list.len(), path.display());
            Arc::new(list)
        }
        None => {
            tracing::info!("no blacklist file given; relaying everything untouched");
            Arc::new(HostSuffixBlacklist::default())
        }
    };

    let candidates = resolve_backend(&args.backend_host, args.backend_port)
        .await
        .context("backend resolution failed")?;

    let config = ProxyConfig {
        listen_port: args.listen_port,
        queue_backlog: args.queue_backlog,
        ..ProxyConfig::default()
    };
    let server = ProxyServer::bind(&config, candidates, blacklist)
        .context("failed to start listening")?;

    println!(
        "Forwarding connections from 0.0.0.0:{} to {}:{}...",
        args.listen_port, args.backend_host, args.backend_port
    );

    server.run().await?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
