//! Serve command - HTTP front end plus the background prerender scheduler.

use std::net::SocketAddr;

use tileserver::frontend::http;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub bind: Option<SocketAddr>,
    pub no_prerender: bool,
}

/// Run the serve command.
pub fn run(runner: &CliRunner, args: ServeArgs) -> Result<(), CliError> {
    runner.log_startup("serve");
    let config = runner.config();

    let app = runner.start_app()?;
    let addr = args.bind.unwrap_or(config.server.http_bind);
    let scheduler = (config.prerender.enabled && !args.no_prerender)
        .then(|| app.scheduler(config.prerender_config()));

    println!("Tileserver HTTP v{}", tileserver::VERSION);
    println!("====================");
    println!();
    println!("Listening:  http://{}/{{z}}/{{x}}/{{y}}.png", addr);
    println!("Cache:      {}", config.cache.directory.display());
    println!("Map data:   {}", config.map.data_directory.display());
    match &scheduler {
        Some(s) => println!(
            "Prerender:  every {}s, {} area(s), {}",
            s.config().interval.as_secs(),
            s.config().areas.len(),
            s.config().staleness
        ),
        None => println!("Prerender:  disabled"),
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = runner.runtime()?;
    let shutdown = runner.shutdown_token()?;
    let service = app.service();

    runtime.block_on(async move {
        let scheduler_task = scheduler.map(|scheduler| {
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        });

        let result = http::serve(addr, service, shutdown.clone()).await;

        // A failed listener takes the scheduler down with it
        shutdown.cancel();
        if let Some(task) = scheduler_task {
            match task.await {
                Ok(cycles) => info!(cycles, "Prerender scheduler finished"),
                Err(e) => warn!(error = %e, "Prerender scheduler task failed"),
            }
        }

        result.map_err(|error| CliError::Serve {
            front_end: "HTTP",
            addr: Some(addr),
            error,
        })
    })?;

    println!("Server stopped.");
    Ok(())
}
