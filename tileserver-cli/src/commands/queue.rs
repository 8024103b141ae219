//! Queue command - file-queue worker fed by the marker scanner.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;

use tileserver::frontend::{MarkerScanner, MARKER_EXTENSION};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the queue command.
pub struct QueueArgs {
    pub directory: Option<PathBuf>,
}

/// Run the queue command.
pub fn run(runner: &CliRunner, args: QueueArgs) -> Result<(), CliError> {
    runner.log_startup("queue");
    let config = runner.config();

    let app = runner.start_app()?;
    let directory = args
        .directory
        .unwrap_or_else(|| config.queue.directory.clone());
    fs::create_dir_all(&directory).map_err(|error| CliError::Serve {
        front_end: "File-queue",
        addr: None,
        error,
    })?;

    let output = config.queue_output_directory();
    let worker = app.queue_worker(output, config.queue.poll_timeout)?;

    println!("Tileserver file queue v{}", tileserver::VERSION);
    println!();
    println!("Markers:    {}/*.{}", directory.display(), MARKER_EXTENSION);
    println!("Output:     {}", output.display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = runner.shutdown_token()?;
    let (tx, rx) = mpsc::channel();

    let spawn_error = |error| CliError::Serve {
        front_end: "File-queue",
        addr: None,
        error,
    };
    let worker_handle = worker.spawn(rx, shutdown.clone()).map_err(spawn_error)?;
    let scanner_handle = MarkerScanner::new(&directory, config.queue.scan_interval)
        .spawn(tx, shutdown.clone())
        .map_err(|error| {
            shutdown.cancel();
            spawn_error(error)
        })?;

    scanner_handle
        .join()
        .map_err(|_| CliError::WorkerPanicked("marker-scanner"))?;
    let stats = worker_handle
        .join()
        .map_err(|_| CliError::WorkerPanicked("file-queue"))?;

    println!();
    println!("{}", stats);
    Ok(())
}
