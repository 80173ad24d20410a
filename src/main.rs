//! HTTP Burst Tester - Main CLI Application
//!
//! Fires a staggered burst of requests at a `/delay/{seconds}` endpoint and
//! reports each one as it lands, or keeps a WebSocket heartbeat running.

use clap::Parser;
use http_burst_tester::{
    app::App,
    cli::Cli,
    config::EnvManager,
    error::{AppError, ErrorReporter, Result},
};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(true), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.env_example {
        print!("{}", EnvManager::create_example_env_content());
        println!();
        println!("{}", EnvManager::display_env_help());
        return Ok(());
    }

    let app = App::new(cli)?;
    app.run().await
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (see --env-example)");
            eprintln!("  - Base URLs must start with http:// or https://");
            eprintln!("  - Heartbeat URLs must start with ws:// or wss://");
        }
        AppError::Network(_) | AppError::Transport(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check that the server is running and reachable");
            eprintln!("  - Verify the --base-url / --heartbeat-url values");
        }
        AppError::TestExecution(_) => {
            eprintln!();
            eprintln!("Execution troubleshooting:");
            eprintln!("  - Fewer than half of the requests succeeded");
            eprintln!("  - Re-run with --verbose to see every failure in full");
            eprintln!("  - Reduce the burst with --count or stagger it with --delay");
        }
        _ => {}
    }
}
