//! Server configuration: the `[server]` table of a TOML file, with CLI
//! overrides applied on top.

use crate::cli::Cli;
use crate::error::AppError;
use crate::templates::default_listing_template;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOSTED_DIRECTORY: &str = "Files";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory tree that is served and uploaded into.
    pub hosted_directory: PathBuf,
    /// Listing template; relative paths are taken from the config file's directory.
    pub template_path: PathBuf,
    pub listen: String,
    pub port: u16,
    /// Chunk size for streaming file bytes.
    pub block_size: usize,
    pub threads: usize,
    pub max_upload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hosted_directory: PathBuf::from(DEFAULT_HOSTED_DIRECTORY),
            template_path: PathBuf::from("index.html"),
            listen: "0.0.0.0".to_string(),
            port: 8000,
            block_size: 128,
            threads: 8,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

fn config_base_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

impl ServerConfig {
    /// Parse a config document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str::<ConfigFile>(text)?.server)
    }

    pub fn to_toml(&self) -> Result<String, AppError> {
        Ok(toml::to_string_pretty(&ConfigFile {
            server: self.clone(),
        })?)
    }

    /// Loads the config file, creating it (plus the default hosted directory
    /// and listing template) when it does not exist yet. Relative paths in
    /// the result are resolved against the config file's directory.
    pub fn load_or_create(config_path: &Path) -> Result<Self, AppError> {
        let base_dir = config_base_dir(config_path);

        let config = if config_path.exists() {
            Self::from_toml(&fs::read_to_string(config_path)?)?
        } else {
            warn!(
                "Config file not found. Creating default {}",
                config_path.display()
            );
            fs::create_dir_all(base_dir)?;
            let config = Self {
                hosted_directory: base_dir.canonicalize()?.join(DEFAULT_HOSTED_DIRECTORY),
                ..Self::default()
            };
            fs::write(config_path, config.to_toml()?)?;
            info!("Default config written to {}", config_path.display());
            config
        };

        let config = config.resolve_relative_to(base_dir);
        config.create_defaults()?;
        Ok(config)
    }

    fn resolve_relative_to(mut self, base_dir: &Path) -> Self {
        if self.hosted_directory.is_relative() {
            self.hosted_directory = base_dir.join(&self.hosted_directory);
        }
        if self.template_path.is_relative() {
            self.template_path = base_dir.join(&self.template_path);
        }
        self
    }

    /// Creates the hosted directory and writes the built-in listing template
    /// when they are missing.
    fn create_defaults(&self) -> Result<(), AppError> {
        if !self.hosted_directory.exists() {
            fs::create_dir_all(&self.hosted_directory)?;
            info!(
                "Created hosted directory '{}'",
                self.hosted_directory.display()
            );
        }
        if !self.template_path.exists() {
            let template = default_listing_template().ok_or_else(|| {
                AppError::TemplateMissing(self.template_path.display().to_string())
            })?;
            fs::write(&self.template_path, template)?;
            info!(
                "Wrote default listing template to '{}'",
                self.template_path.display()
            );
        }
        Ok(())
    }

    /// Flags given on the command line replace the file's values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(directory) = &cli.directory {
            self.hosted_directory = directory.clone();
        }
        if let Some(template) = &cli.template {
            self.template_path = template.clone();
        }
        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(threads) = cli.threads {
            self.threads = threads;
        }
        if let Some(block_size) = cli.block_size {
            self.block_size = block_size;
        }
        if let Some(max_upload_size) = cli.max_upload_size {
            self.max_upload_size = max_upload_size;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.hosted_directory.is_dir() {
            return Err(AppError::DirectoryNotFound(
                self.hosted_directory.to_string_lossy().into_owned(),
            ));
        }
        if self.block_size == 0 {
            return Err(AppError::InvalidConfig("block_size must be at least 1".to_string()));
        }
        if self.threads == 0 {
            return Err(AppError::InvalidConfig("threads must be at least 1".to_string()));
        }
        Ok(())
    }
}
