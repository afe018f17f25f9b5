use crate::config::ServerConfig;
use crate::error::AppError;
use crate::fs::is_directory;
use crate::http::handle_client;
use log::{debug, error, info};
use rand::Rng;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use threadpool::ThreadPool;

/// Read-only state shared by every worker.
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,
    /// Canonical form of `config.hosted_directory`.
    pub hosted_root: PathBuf,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Result<Self, AppError> {
        config.validate()?;
        let hosted_root = config.hosted_directory.canonicalize()?;
        if !is_directory(&hosted_root)? {
            return Err(AppError::DirectoryNotFound(
                config.hosted_directory.to_string_lossy().into_owned(),
            ));
        }
        Ok(Self {
            config,
            hosted_root,
        })
    }
}

pub fn run_server(
    config: ServerConfig,
    shutdown_rx: Option<mpsc::Receiver<()>>,
    addr_tx: Option<mpsc::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    let ctx = Arc::new(ServerContext::new(config)?);

    let ip: IpAddr = ctx.config.listen.parse()?;
    let listener = TcpListener::bind(SocketAddr::new(ip, ctx.config.port))?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    if let Some(tx) = addr_tx {
        if tx.send(local_addr).is_err() {
            return Err(AppError::InternalServerError(
                "Failed to send server address to test thread".to_string(),
            ));
        }
    }

    info!(
        "Serving '{}' at http://{} (block size {}, upload limit {} bytes)",
        ctx.hosted_root.display(),
        local_addr,
        ctx.config.block_size,
        ctx.config.max_upload_size
    );

    let pool = ThreadPool::new(ctx.config.threads);

    'server_loop: loop {
        if let Some(ref rx) = shutdown_rx {
            if rx.try_recv().is_ok() {
                info!("Shutdown signal received. Shutting down gracefully.");
                break 'server_loop;
            }
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                // Accepted sockets may inherit non-blocking mode from the listener.
                if let Err(e) = stream.set_nonblocking(false) {
                    error!("Failed to configure connection from {peer}: {e}");
                    continue;
                }
                let ctx = Arc::clone(&ctx);
                let request_id = generate_request_id();
                let log_prefix = format!("[ReqID: {request_id}][Peer: {peer}]");

                pool.execute(move || {
                    debug!("{log_prefix} Handling client connection");
                    handle_client(stream, &ctx, &log_prefix);
                    debug!("{log_prefix} Client handled");
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(e) => {
                error!("Error accepting connection: {e}");
            }
        }
    }

    pool.join();
    info!("Server shutting down gracefully.");
    Ok(())
}

fn generate_request_id() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
