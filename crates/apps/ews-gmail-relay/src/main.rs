//! ews-gmail-relay - Moves unread Exchange mail into a Gmail inbox
//!
//! Main entry point for the command-line relay. Meant to be run
//! periodically (e.g. from cron); each run relays at most one page.

use anyhow::Context;
use clap::{ArgGroup, Parser};
use log::{error, info, warn};
use relay::{GmailAuth, GmailClient, GmailCredentials, RelayConfig, RelayEngine};
use std::path::PathBuf;
use std::process::ExitCode;

/// Relay unread Exchange Web Services mail into Gmail
#[derive(Parser, Debug)]
#[command(name = "ews-gmail-relay")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("action").required(true).args(["fetch", "labels", "readfile"])))]
struct Cli {
    /// Path to the relay properties file
    #[arg(short, long)]
    config: PathBuf,

    /// Google OAuth client secret JSON (default: ~/.config/ews-gmail-relay/google-credentials.json)
    #[arg(short, long)]
    secret: Option<PathBuf>,

    /// Relay unread EWS messages into Gmail
    #[arg(short, long)]
    fetch: bool,

    /// List the Gmail labels available for gmailLabelIds
    #[arg(short, long)]
    labels: bool,

    /// Insert a raw RFC 2822 message file into Gmail
    #[arg(short, long, value_name = "FILE")]
    readfile: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = RelayConfig::load(&cli.config)?;
    info!("Loaded config from {}", cli.config.display());

    let gmail = gmail_client(cli, &config)?;

    if cli.fetch {
        let engine = RelayEngine::new(&gmail, config.relay_options());
        // Relay failures are logged by the engine and do not change the exit code
        engine.relay_unread(&config.ews_connector());
    } else if cli.labels {
        print_labels(&gmail)?;
    } else if let Some(path) = &cli.readfile {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let engine = RelayEngine::new(&gmail, config.relay_options());
        let id = engine.import_raw(&raw)?;
        println!("Inserted {} as {}", path.display(), id);
    }

    Ok(())
}

fn gmail_client(cli: &Cli, config: &RelayConfig) -> anyhow::Result<GmailClient> {
    let creds = match GmailCredentials::load(cli.secret.as_deref()) {
        Ok(creds) => creds,
        Err(e) => {
            if let Some(path) = GmailCredentials::default_credentials_path() {
                warn!(
                    "To configure Gmail access, either:\n\
                     1. Pass your Google OAuth client secret with --secret\n\
                     2. Place it at: {}\n\
                     3. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                    path.display()
                );
            }
            return Err(e);
        }
    };

    let auth = GmailAuth::new(creds.client_id, creds.client_secret)?;
    Ok(GmailClient::new(auth, config.gmail_address.email.clone()))
}

fn print_labels(gmail: &GmailClient) -> anyhow::Result<()> {
    let labels = gmail.list_labels()?;
    if labels.is_empty() {
        println!("No labels found.");
        return Ok(());
    }

    println!("Label name (label ID):");
    for label in &labels {
        println!("- {} ({})", label.name, label.id);
    }
    Ok(())
}
