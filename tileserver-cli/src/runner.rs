//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, application startup
//! and shutdown wiring to reduce duplication across command handlers.

use std::path::PathBuf;

use tileserver::app::{AppConfig, AppError, TileServerApp};
use tileserver::config::ConfigFile;
use tileserver::logging::{init_logging, split_log_path, LoggingGuard};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Global options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Explicit config file; `~/.tileserver/config.ini` when unset
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub stdout_logging: bool,
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load the configuration and initialize logging.
    pub fn new(options: &RunnerOptions) -> Result<Self, CliError> {
        let config = match &options.config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(
            &log_dir,
            &log_file,
            options.stdout_logging,
            options.debug,
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Tileserver v{}", tileserver::VERSION);
        info!("Tileserver CLI: {} command", command);
        info!(log = %self.logging_guard.log_path().display(), "Logging to file");
    }

    /// Run every startup check and build the shared service.
    pub fn start_app(&self) -> Result<TileServerApp, CliError> {
        let app = TileServerApp::start(AppConfig::from(&self.config))?;
        Ok(app)
    }

    /// Build the multi-threaded Tokio runtime.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("tileserver-worker")
            .build()
            .map_err(|e| CliError::Startup(AppError::RuntimeCreation(e.to_string())))
    }

    /// Token cancelled on Ctrl+C.
    ///
    /// The handler can be installed once per process.
    pub fn shutdown_token(&self) -> Result<CancellationToken, CliError> {
        let shutdown = CancellationToken::new();
        let handler_token = shutdown.clone();

        ctrlc::set_handler(move || {
            println!();
            println!("Received shutdown signal, stopping...");
            handler_token.cancel();
        })
        .map_err(|e| CliError::SignalHandler(e.to_string()))?;

        Ok(shutdown)
    }
}
