//! Migration CLI.
//!
//! `backhaul <run-config.json>` loads the run configuration, wires the
//! session broker, drives the engine, and prints the report as JSON. Exit
//! codes: 0 on a clean run, 1 when any entry failed, 2 on a run that could
//! not start.

use std::path::PathBuf;
use std::time::Duration;

use backhaul::session::{DisabledSessionBroker, HttpSessionBroker, SessionBroker};
use backhaul::{config, run_migration};

#[tokio::main]
async fn main() {
    env_logger::init();

    let Some(config_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: backhaul <run-config.json>");
        std::process::exit(2);
    };

    let run_config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {}", config_path.display(), e);
            std::process::exit(2);
        }
    };

    let timeout = Duration::from_secs(run_config.settings.request_timeout_secs);
    let broker: Box<dyn SessionBroker> = match run_config.automation_url.as_deref() {
        Some(url) => match HttpSessionBroker::new(url, timeout) {
            Ok(broker) => Box::new(broker),
            Err(e) => {
                eprintln!("invalid automation url: {}", e);
                std::process::exit(2);
            }
        },
        None => {
            log::warn!("no automation url configured; all entries will use the generic credential");
            Box::new(DisabledSessionBroker)
        }
    };

    let report = match run_migration(
        &run_config.source,
        &run_config.target,
        &run_config.authors,
        broker,
        run_config.settings,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            eprintln!("migration could not start: {}", e);
            std::process::exit(2);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("report serialization failed: {}", e),
    }

    if report.failure_count > 0 {
        std::process::exit(1);
    }
}
