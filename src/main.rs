//! AgroPan Notifier - emails active subscribers about platform events.

use agropan_notifier::{
    cli::{Cli, Command},
    config::Config,
    events::{EmergencyAlert, SensorReading},
    notification::NotificationDispatcher,
    smtp::SmtpTransport,
    store::CsvSubscriberStore,
    BatchReport,
};
use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("SMTP Server: {}:{}", config.smtp.host, config.smtp.port);
    info!("SMTP Security: {:?}", config.smtp.security_mode());
    info!(
        "SMTP Auth: {}",
        match &config.smtp.username {
            Some(user) if config.smtp.password.is_some() => user.as_str(),
            _ => "Disabled",
        }
    );
    info!("Sender: {} <{}>", config.smtp.from_name, config.smtp.from_address);
    info!(
        "Timeouts: connect {}ms, io {}ms",
        config.smtp.connect_timeout_ms, config.smtp.io_timeout_ms
    );
    info!("Subscribers: {}", config.store.subscribers_path.display());
    info!("-------------------------------------------------------");

    let Some(command) = cli.command else {
        bail!("no event given; use the `sensor` or `alert` subcommand");
    };

    let transport = Arc::new(SmtpTransport::new(config.smtp.clone())?);
    let store = Arc::new(CsvSubscriberStore::new(&config.store.subscribers_path));
    let dispatcher = NotificationDispatcher::new(store, transport, config.notifier.clone());

    let report = match command {
        Command::Sensor(args) => {
            let reading = SensorReading::from(args);
            reading.validate()?;
            dispatcher.notify_sensor_reading(&reading).await
        }
        Command::Alert(args) => {
            let alert = EmergencyAlert::from(args);
            alert.validate()?;
            dispatcher.notify_emergency_alert(&alert).await
        }
    };

    summarize(&report);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    // Delivery is best-effort; failed recipients do not change the exit status.
    Ok(())
}

fn summarize(report: &BatchReport) {
    info!(
        "Notified {} of {} subscribers",
        report.delivered(),
        report.attempted()
    );
    for failure in report.failures() {
        error!("Delivery to {} failed: {}", failure.recipient, failure.diagnostic);
    }
}
