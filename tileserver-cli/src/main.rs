//! Tileserver CLI - Command-line interface
//!
//! This binary serves raster map tiles from the `tileserver` library over
//! HTTP, a plain TCP socket, or a file-based request queue, and runs the
//! prerender scheduler.

mod commands;
mod error;
mod runner;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use error::CliError;
use runner::{CliRunner, RunnerOptions};

#[derive(Parser)]
#[command(name = "tileserver")]
#[command(version = tileserver::VERSION)]
#[command(about = "Raster map tile server with a prerendering file-system cache", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tileserver/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    /// Only log to the log file
    #[arg(long, global = true)]
    no_stdout: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tiles over HTTP and run the prerender scheduler when enabled
    Serve {
        /// Listen address (overrides [server] http_bind)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Do not start the prerender scheduler
        #[arg(long)]
        no_prerender: bool,
    },

    /// Serve tiles to the line-based socket protocol ("z;x;y")
    Socket {
        /// Listen address (overrides [server] socket_bind)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Concurrent connections (overrides [server] socket_workers)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Render tiles requested through marker files in the queue directory
    Queue {
        /// Marker directory (overrides [queue] directory)
        #[arg(long)]
        directory: Option<PathBuf>,
    },

    /// Run one prerender cycle
    Prerender {
        /// Keep running cycles until interrupted
        #[arg(long = "loop")]
        run_forever: bool,
    },

    /// Tile cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = RunnerOptions {
        config_path: cli.config,
        debug: cli.debug,
        stdout_logging: !cli.no_stdout,
    };
    let runner = CliRunner::new(&options)?;

    match cli.command {
        Commands::Serve { bind, no_prerender } => commands::serve::run(
            &runner,
            commands::serve::ServeArgs { bind, no_prerender },
        ),
        Commands::Socket { bind, workers } => commands::socket::run(
            &runner,
            commands::socket::SocketArgs { bind, workers },
        ),
        Commands::Queue { directory } => {
            commands::queue::run(&runner, commands::queue::QueueArgs { directory })
        }
        Commands::Prerender { run_forever } => commands::prerender::run(
            &runner,
            commands::prerender::PrerenderArgs { run_forever },
        ),
        Commands::Cache { action } => commands::cache::run(&runner, action),
    }
}
