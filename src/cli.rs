use clap::Parser;
use std::path::PathBuf;

// Defines the command-line interface using clap. 🎉
// Everything except logging can also live in the config file; flags given here win.
#[derive(Parser, Debug, Default)]
#[command(
    author = "Harshit Jain",
    version,
    long_about = "A minimal file server that exposes one directory tree for browsing and download.\n Directories are rendered through an HTML template, files support byte-range requests,\n and files can be uploaded into any served directory with a multipart form POST.\n Settings are read from a TOML config file which is created with defaults on first start.\n",
    about = "A minimal file server with range downloads and multipart uploads."
)]
pub struct Cli {
    /// Path of the TOML config file; created with defaults if it does not exist. 📝
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Directory to serve and accept uploads into. 📂
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Host address to listen on (e.g. "127.0.0.1" for local, "0.0.0.0" for everyone). 👂
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Port number to listen on. 🚪
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of threads in the thread pool. 🧵
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Size of the chunks file bytes are streamed in. 📦
    #[arg(short, long)]
    pub block_size: Option<usize>,

    /// HTML template used for directory listings.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Largest accepted upload body in bytes.
    #[arg(long)]
    pub max_upload_size: Option<u64>,

    /// Enable verbose logging for debugging (log level: debug). 🐛
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Enable more detailed logging (log level: info). ℹ️
    #[arg(long, default_value_t = false)]
    pub detailed_logging: bool,
}
