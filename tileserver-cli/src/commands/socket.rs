//! Socket command - fixed-size worker pool answering "z;x;y" requests.

use std::net::SocketAddr;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the socket command.
pub struct SocketArgs {
    pub bind: Option<SocketAddr>,
    pub workers: Option<usize>,
}

/// Run the socket command.
pub fn run(runner: &CliRunner, args: SocketArgs) -> Result<(), CliError> {
    runner.log_startup("socket");
    let config = runner.config();

    let app = runner.start_app()?;
    let addr = args.bind.unwrap_or(config.server.socket_bind);
    let workers = args.workers.unwrap_or(config.server.socket_workers);
    if workers == 0 {
        return Err(CliError::InvalidArgument(
            "--workers must be at least 1".to_string(),
        ));
    }
    let front_end = app.socket_front_end(workers);

    println!("Tileserver socket v{}", tileserver::VERSION);
    println!();
    println!("Listening:  {} ({} workers)", addr, workers);
    match &config.cache.prerendered_directory {
        Some(dir) => println!("Prerendered: {}", dir.display()),
        None => println!("Prerendered: none"),
    }
    println!("Cache:      {}", config.cache.directory.display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = runner.runtime()?;
    let shutdown = runner.shutdown_token()?;

    runtime
        .block_on(front_end.bind_and_serve(addr, shutdown))
        .map_err(|error| CliError::Serve {
            front_end: "Socket",
            addr: Some(addr),
            error,
        })?;

    println!("Server stopped.");
    Ok(())
}
