#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI that prints envelope and attachment summaries of every folder
//! on an IMAP server

use anyhow::Context;
use clap::Parser;
use imap_summary::{
    EnvPassword, Fallback, ImapClient, ImapConfig, MessageSelector, OutputFormat, PromptPassword,
    ServerAddress, TlsMode, TlsVerification,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imap-summary")]
#[command(
    about = "Print sender, recipient, subject, date, size and attachments of IMAP messages"
)]
struct Args {
    /// Upgrade the connection with STARTTLS before logging in (or set
    /// IMAP_SSL=1)
    #[arg(long)]
    ssl: bool,

    /// Server and port (default: $IMAP_SERVER or imap.mail.ru:143)
    #[arg(short, long)]
    server: Option<String>,

    /// Number (interval) of letters: N for the first N, A B for the
    /// zero-based inclusive range A..=B; all letters when omitted
    #[arg(short = 'n', num_args = 1..=2, allow_negative_numbers = true)]
    n: Vec<i64>,

    /// User name (default: $IMAP_USERNAME)
    #[arg(short, long)]
    user: Option<String>,

    /// Accept any server certificate, for self-signed servers (or set
    /// IMAP_INSECURE=1)
    #[arg(long)]
    insecure: bool,

    /// Output one JSON object per message
    #[arg(long)]
    json: bool,

    /// Idle time in milliseconds after which a response is complete
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tokio::select! {
        result = run(&args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("Terminated.\n");
            ExitCode::SUCCESS
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = build_config(args)?;
    let password = Fallback::new(EnvPassword::default(), PromptPassword);
    let client = ImapClient::new(config, password);

    let mut stdout = std::io::stdout();
    client.run(&mut stdout).await?;
    Ok(())
}

/// The environment (`.env` honoured), with command-line flags on top.
fn build_config(args: &Args) -> anyhow::Result<ImapConfig> {
    let mut config = match &args.user {
        Some(user) => ImapConfig::from_env_for(user.clone())?,
        None => ImapConfig::from_env().context("No user name given (use -u or IMAP_USERNAME)")?,
    };

    if let Some(server) = &args.server {
        config.address = ServerAddress::parse(server)?;
    }
    if args.ssl {
        config.tls = TlsMode::StartTls;
    }
    if args.insecure {
        config.verification = TlsVerification::AcceptAny;
    }
    if args.json {
        config.format = OutputFormat::Json;
    }
    config.selector = MessageSelector::from_bounds(&args.n)?;
    config.read_timeout = Duration::from_millis(args.timeout_ms);

    Ok(config)
}
