/// # hdl_share
///
/// A minimal file server: browse a directory tree through a templated
/// listing, download files whole or by byte range, and upload files with a
/// multipart form POST.
///
/// The `run` function loads the configuration and starts the server based
/// on command-line arguments.
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod listing;
pub mod range;
pub mod response;
pub mod server;
pub mod stream;
pub mod templates;
pub mod upload;
pub mod utils;


use crate::cli::Cli;
use crate::config::ServerConfig;
use clap::Parser;
use log::error;

/// Initializes the logger, loads the configuration, and starts the server.
///
/// If loading fails or the server returns an error, it is logged and the
/// process exits.
pub fn run() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.detailed_logging {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::debug!("Log level set to: {log_level}");

    let mut config = match ServerConfig::load_or_create(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config '{}': {e}", cli.config.display());
            std::process::exit(1);
        }
    };
    config.apply_cli(&cli);

    if let Err(e) = server::run_server(config, None, None) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
