//! Job offer notifier
//!
//! Meant to be started on a timer by the OS scheduler. Each run fetches
//! the current job offers, drops those already notified in earlier runs,
//! sends one notification per new offer and saves the updated list of
//! seen offers.

mod config;
mod filter;
mod history;
mod notify;
mod run;
mod source;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use common::{JsonFileStore, LinesFileStore, LockError, RunLock, SeenStore};
use crate::config::{NotifyChannel, SeenFormat, Settings, SourceKind};
use filter::OfferFilter;
use history::{NotificationHistory, RunRecord};
use notify::{LogNotifier, Notifier, SendGridNotifier, Throttled};
use run::RecurringNotifier;
use source::{AdzunaSource, OfferSource, WeWorkRemotelySource};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "job-notifier", version, about = "Notify about new job offers")]
struct Cli {
    /// Directory holding default.toml / local.toml
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Log notifications instead of delivering them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    let settings = match Settings::load(&cli.config_dir) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_logging(&settings.logging.level, settings.logging.json) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match execute(&cli, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Notifier run failed");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, mut settings: Settings) -> Result<()> {
    if cli.dry_run {
        settings.notify.channel = NotifyChannel::Log;
    }
    settings
        .validate()
        .map_err(|e| anyhow!(e))
        .context("Invalid configuration")?;

    info!(
        source = ?settings.source.kind,
        channel = ?settings.notify.channel,
        seen_path = %settings.storage.seen_path.display(),
        "Starting job notifier"
    );
    debug!(nlp_model = ?settings.nlp.model, "NLP model configured");

    let lock = RunLock::new(
        &settings.storage.lock_path,
        Duration::from_secs(settings.storage.lock_stale_seconds),
    );
    let _guard = match lock.acquire() {
        Ok(guard) => guard,
        Err(LockError::Held {
            pid, acquired_at, ..
        }) => {
            warn!(
                pid = pid,
                acquired_at = %acquired_at,
                "Another run is in progress, skipping this one"
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to acquire run lock"),
    };

    let source = build_source(&settings)?;
    let notifier = build_notifier(&settings)?;
    let store = build_store(&settings);
    let filter = OfferFilter::from_config(&settings.source);

    let report =
        RecurringNotifier::new(source.as_ref(), notifier.as_ref(), store.as_ref(), filter).run()?;

    let history = NotificationHistory::new(&settings.storage.history_path);
    if let Err(e) = history.append(RunRecord::from_report(&report, settings.notify.recipient.clone())) {
        warn!(
            path = %history.path().display(),
            error = %format!("{:#}", e),
            "Failed to record run history"
        );
    }

    info!(
        fetched = report.fetched,
        new = report.new,
        sent = report.sent,
        failed = report.failed,
        "Job notifier finished"
    );
    Ok(())
}

fn build_source(settings: &Settings) -> Result<Box<dyn OfferSource>> {
    let source: Box<dyn OfferSource> = match settings.source.kind {
        SourceKind::Adzuna => Box::new(
            AdzunaSource::new(&settings.adzuna, &settings.source)
                .context("Failed to set up Adzuna source")?,
        ),
        SourceKind::WeWorkRemotely => Box::new(
            WeWorkRemotelySource::new(&settings.weworkremotely)
                .context("Failed to set up WeWorkRemotely source")?,
        ),
    };
    Ok(source)
}

fn build_notifier(settings: &Settings) -> Result<Box<dyn Notifier>> {
    let notify = &settings.notify;

    let channel: Box<dyn Notifier> = match notify.channel {
        NotifyChannel::Log => Box::new(LogNotifier::new(notify.recipient.clone())),
        NotifyChannel::SendGrid => {
            let api_key = notify
                .sendgrid_api_key
                .clone()
                .context("SENDGRID_API_KEY must be set")?;
            let sender = notify.sender.clone().context("EMAIL_SENDER must be set")?;
            let recipient = notify
                .recipient
                .clone()
                .context("NOTIFICATION_EMAIL must be set")?;
            Box::new(
                SendGridNotifier::new(notify, api_key, sender, recipient)
                    .context("Failed to set up SendGrid client")?,
            )
        }
        NotifyChannel::Smtp => return Err(anyhow!("SMTP delivery is not supported")),
    };

    let notifier: Box<dyn Notifier> = match notify.max_per_minute {
        Some(limit) => Box::new(Throttled::per_minute(channel, limit)),
        None => channel,
    };
    Ok(notifier)
}

fn build_store(settings: &Settings) -> Box<dyn SeenStore> {
    let path = settings.storage.seen_path.clone();
    let store: Box<dyn SeenStore> = match settings.storage.seen_format {
        SeenFormat::Json => Box::new(JsonFileStore::new(path)),
        SeenFormat::Lines => Box::new(LinesFileStore::new(path)),
    };
    store
}
