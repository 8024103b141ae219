//! Prerender command - one scheduler cycle, or the scheduler loop.

use tileserver::prerender::CycleReport;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the prerender command.
pub struct PrerenderArgs {
    pub run_forever: bool,
}

/// Run the prerender command.
pub fn run(runner: &CliRunner, args: PrerenderArgs) -> Result<(), CliError> {
    runner.log_startup("prerender");
    let config = runner.config();

    let app = runner.start_app()?;
    let scheduler = app.scheduler(config.prerender_config());

    println!("Tileserver prerender v{}", tileserver::VERSION);
    println!();
    println!("Global band: zoom 0 to {}", scheduler.config().global_max_zoom);
    for area in &scheduler.config().areas {
        println!("Area:        {}", area);
    }
    println!("Staleness:   {}", scheduler.config().staleness);
    println!();

    let runtime = runner.runtime()?;
    let shutdown = runner.shutdown_token()?;

    if args.run_forever {
        println!("Press Ctrl+C to stop");
        println!();
        let cycles = runtime.block_on(scheduler.run(shutdown));
        println!("Stopped after {} cycle(s).", cycles);
        return Ok(());
    }

    let report = runtime.block_on(scheduler.run_cycle(&shutdown));
    print_report(&report);
    Ok(())
}

fn print_report(report: &CycleReport) {
    if report.skipped {
        println!("Map data unchanged since the last run, nothing to do.");
        return;
    }

    println!("Cycle Summary");
    println!("─────────────");
    if let Some(swept) = &report.swept {
        println!("  {}", swept);
    }
    if let Some(global) = &report.global {
        println!("  global: {}", global);
    }
    for (name, area) in &report.areas {
        println!("  {}: {}", name, area);
    }
    println!(
        "  Total: {} rendered, {} failed",
        report.rendered(),
        report.failed()
    );
    if report.interrupted {
        println!("  Interrupted before all areas were rendered.");
    }
}
