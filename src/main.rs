//! Tor v3 Vanity Onion Generator CLI
//!
//! Usage:
//!   onion_vanity -prefix cwtch                 # Stop at the first match
//!   onion_vanity -prefix cw -keep-going        # Export every match until Ctrl+C
//!   PROFILE_PASSWORD=secret onion_vanity -prefix abc -cpus 4

use std::process;

use tracing_subscriber::EnvFilter;

use onion_vanity::{
    CancellationToken, Config, Coordinator, ProfileExporter, ProfileStore, ShutdownController,
};

fn main() {
    init_tracing();

    let config = Config::from_args();

    let settings = match config.settings(|key| std::env::var(key).ok()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let store = match ProfileStore::bootstrap_scratch(&std::env::temp_dir(), &settings.password) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to create encrypted store: {}", e);
            process::exit(1);
        }
    };

    let mut exporter = match ProfileExporter::new(store, &settings.profile_name, &settings.out_dir)
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Failed to store profile name: {}", e);
            process::exit(1);
        }
    };

    let request = &settings.request;
    println!(
        "Using {} CPU cores to find vanity address with prefix: {}",
        request.worker_count(),
        settings.profile_name
    );
    println!("Difficulty: {}", request.prefix().difficulty_description());

    let token = CancellationToken::new();
    if let Err(e) = ShutdownController::new(token.clone()).install() {
        eprintln!("Error setting Ctrl-C handler: {}", e);
        process::exit(1);
    }

    match Coordinator::new(token).run(request, &mut exporter) {
        Ok(outcome) => {
            let reports = outcome.pool.join();
            let attempts: u64 = reports.iter().map(|r| r.attempts).sum();
            tracing::info!(
                matches = outcome.matches,
                stop = ?outcome.stop,
                attempts,
                workers = reports.len(),
                "search finished"
            );
        }
        Err(e) => {
            eprintln!("Search failed: {}", e);
            // process::exit skips destructors; remove the scratch profile first.
            drop(exporter);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
