//! `photoferry` - ferries photo attachments from a watched mailbox into a
//! photo library album.
//!
//! Designed to run unattended from cron or CI: one invocation is one
//! pipeline run, the exit code is the contract. Zero means the mailbox was
//! searched and extraction completed, even if individual uploads failed;
//! non-zero means a fatal mailbox, ledger, or configuration error.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photoferry_core::{Config, DedupLedger, ImapMailbox, RunSummary, pipeline, validate_config};
use photoferry_photos::{Credentials, GOOGLE_TOKEN_URL, PhotosClient};

#[derive(Parser)]
#[command(name = "photoferry", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion pipeline once.
    Run {
        /// Override the configured lookback window, in days.
        #[arg(long, value_name = "DAYS")]
        days_back: Option<u32>,
    },
    /// Validate the configuration and print the resolved settings.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photoferry=info,photoferry_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli.config)?;
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    apply_env_overrides(&mut config);

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            error!(field = e.field(), "{e}");
        }
        return Err(anyhow!("Configuration invalid ({} problems)", errors.len()));
    }

    match cli.command {
        Command::CheckConfig => {
            print_resolved(&config, &config_path);
            Ok(())
        }
        Command::Run { days_back } => {
            if let Some(days) = days_back {
                config.filter.lookback_days = days;
            }
            run_pipeline(&config).await
        }
    }
}

async fn run_pipeline(config: &Config) -> anyhow::Result<()> {
    info!(
        sender = %config.mailbox.sender_email,
        lookback_days = config.filter.lookback_days,
        album = %config.uploads.album_name,
        "Starting run"
    );

    let ledger = DedupLedger::open(&config.ledger.path)
        .await
        .context("Dedup ledger unavailable")?;

    let mut mailbox = ImapMailbox::connect(&config.mailbox)
        .await
        .context("Mailbox unavailable")?;

    // Token refresh failure is a credentials problem, i.e. configuration,
    // so it is fatal rather than a per-item upload failure.
    let credentials = Credentials {
        client_id: config.photos.client_id.clone(),
        client_secret: config.photos.client_secret.clone(),
        refresh_token: config.photos.refresh_token.clone(),
        token_url: config
            .photos
            .token_url
            .clone()
            .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
    };
    let token = credentials
        .refresh(&reqwest::Client::new())
        .await
        .context("Photo library credentials rejected")?;

    let mut photos = PhotosClient::new(token).context("Photo library client setup failed")?;
    if let Some(ref base) = config.photos.api_base {
        photos = photos
            .with_base_url(base)
            .context("Invalid photo library API base URL")?;
    }

    let result = pipeline::run(&mut mailbox, &photos, &ledger, config).await;
    mailbox.disconnect().await;

    let summary = result.context("Run aborted")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Run summary:");
    println!("  candidates found:    {}", summary.candidates);
    println!("  attachments kept:    {}", summary.extracted);
    println!("  parts excluded:      {}", summary.rejected_parts);
    println!("  corrupt messages:    {}", summary.corrupt_messages);
    println!("  duplicates skipped:  {}", summary.skipped_duplicates);
    println!("  uploaded:            {}", summary.uploaded);
    println!(
        "  failed:              {} ({} transient, {} permanent)",
        summary.failed(),
        summary.failed_transient,
        summary.failed_permanent
    );
    for item in &summary.failures {
        println!(
            "    {} (message {}): {} - {}",
            item.filename, item.message_uid, item.kind, item.detail
        );
    }
}

fn print_resolved(config: &Config, path: &std::path::Path) {
    println!("Configuration OK: {}", path.display());
    println!("  mailbox:   {}:{}", config.mailbox.host, config.mailbox.port);
    println!("  watching:  {}", config.mailbox.sender_email);
    println!("  subject:   {:?}", config.filter.subject_pattern);
    println!("  lookback:  {} days", config.filter.lookback_days);
    println!("  album:     {}", config.uploads.album_name);
    println!(
        "  formats:   {}",
        config.uploads.supported_formats.join(", ")
    );
    println!("  max size:  {} MB", config.uploads.max_file_size_mb);
    println!("  attempts:  {}", config.uploads.max_upload_attempts);
    println!("  ledger:    {}", config.ledger.path);
}

/// Resolves the configuration file path: explicit flag, then
/// `photoferry.toml` in the working directory, then the user config dir.
fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let local = PathBuf::from("photoferry.toml");
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("photoferry").join("config.toml");
        if user.exists() {
            return Ok(user);
        }
    }

    Err(anyhow!(
        "No configuration file found; pass --config or create photoferry.toml"
    ))
}

/// Secrets may arrive from the environment instead of the config file, e.g.
/// when running from CI with stored secrets.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(password) = std::env::var("PHOTOFERRY_IMAP_PASSWORD") {
        config.mailbox.password = password;
    }
    if let Ok(secret) = std::env::var("PHOTOFERRY_CLIENT_SECRET") {
        config.photos.client_secret = secret;
    }
    if let Ok(token) = std::env::var("PHOTOFERRY_REFRESH_TOKEN") {
        config.photos.refresh_token = token;
    }
}
