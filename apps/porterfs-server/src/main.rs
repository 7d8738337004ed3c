//! PorterFS - a single-binary S3-compatible object store over a local
//! filesystem.
//!
//! Clients speak to it the way they speak to S3: path-style URLs, XML
//! responses, AWS Signature Version 4 authentication.
//!
//! # Usage
//!
//! ```text
//! porterfs --config config.yaml
//! ```
//!
//! `PORT` in the environment replaces the configured port, and `RUST_LOG`
//! overrides the configured log level filter.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use porterfs_auth::{StaticCredentials, VerifyOptions};
use porterfs_http::{AppState, PorterService};
use porterfs_store::FsStore;

use config::{Config, LogFormat};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "porterfs", about = "S3-compatible object storage over a local filesystem")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level filters.
fn init_tracing(config: &Config) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(&config.log.level)
            .with_context(|| format!("invalid log level: {}", config.log.level))?
    };

    match config.log.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

/// Load the TLS acceptor from the configured PEM files.
fn load_tls_acceptor(config: &Config) -> Result<TlsAcceptor> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cert_path = config
        .tls
        .cert_path
        .as_ref()
        .context("tls.cert-path not configured")?;
    let key_path = config
        .tls
        .key_path
        .as_ref()
        .context("tls.key-path not configured")?;

    let cert_pem = std::fs::read(cert_path)
        .with_context(|| format!("cannot read certificate {}", cert_path.display()))?;
    let key_pem = std::fs::read(key_path)
        .with_context(|| format!("cannot read private key {}", key_path.display()))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .context("cannot parse certificate chain")?;
    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .context("cannot parse private key")?
        .context("no private key found in key file")?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate or key")?;

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

/// Plain-TCP accept loop with graceful connection draining.
async fn serve_plain(listener: TcpListener, service: PorterService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => break,
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

/// TLS accept loop. The handshake happens inside the per-connection task so
/// a slow client cannot stall the accept loop.
async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    service: PorterService,
) -> Result<()> {
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let service = service.clone();
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(tls_stream) => tls_stream,
                        Err(e) => {
                            warn!(peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                    };
                    let http = HttpConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = http
                        .serve_connection(TokioIo::new(tls_stream), service)
                        .await
                    {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => break,
        }
    }

    info!("exiting");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    config.validate()?;

    init_tracing(&config)?;

    let store = FsStore::open(&config.storage.root_path, config.max_object_size())
        .await
        .with_context(|| {
            format!(
                "cannot open storage root {}",
                config.storage.root_path.display()
            )
        })?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        credentials: StaticCredentials::new(
            config.auth.access_key.clone(),
            config.auth.secret_key.clone(),
        ),
        verify: VerifyOptions {
            max_clock_skew: config
                .auth
                .max_clock_skew_seconds
                .map(|secs| chrono::Duration::seconds(secs as i64)),
        },
    });
    let service = PorterService::new(state);

    let listen = config.effective_listen_address();
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address: {listen}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        storage_root = %config.storage.root_path.display(),
        tls = config.tls.enabled,
        "starting PorterFS",
    );

    if config.tls.enabled {
        let acceptor = load_tls_acceptor(&config)?;
        serve_tls(listener, acceptor, service).await
    } else {
        serve_plain(listener, service).await
    }
}
