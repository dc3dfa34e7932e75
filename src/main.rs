use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixstore_core::{Log, LogStream, MessageStore, SeqNum, SessionKey};
use fixstore_settings::{load_settings, load_settings_from_path};
use fixstore_store::{LogFactory, StoreFactory};
use fixstore_telemetry::{init_telemetry, TelemetryConfig};

/// Inspect and administer a FIX session store.
#[derive(Parser)]
#[command(name = "fixstore", version)]
struct Cli {
    /// Settings file (defaults to $FIXSTORE_SETTINGS or ~/.fixstore/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the persisted session row. Creates it if the session is new.
    Show { key: SessionKey },
    /// Print archived messages in an inclusive sequence range.
    Messages {
        key: SessionKey,
        begin: SeqNum,
        end: SeqNum,
    },
    /// Set the next outgoing sequence number.
    SetSender { key: SessionKey, seq: SeqNum },
    /// Set the next incoming sequence number.
    SetTarget { key: SessionKey, seq: SeqNum },
    /// Drop archived messages and restart both counters at 1.
    Reset { key: SessionKey },
    /// Print the most recent audit rows of one stream.
    LogTail {
        key: SessionKey,
        stream: LogStream,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Clear the audit log for one session, or every row when no key is given.
    LogClear { key: Option<SessionKey> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig {
        json: cli.json_logs,
        ..Default::default()
    };
    if cli.verbose {
        telemetry.log_level = tracing::Level::DEBUG;
    }
    let _ = init_telemetry(&telemetry);

    let settings = match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("loading settings")?;

    match cli.command {
        Command::Show { key } => {
            let store = StoreFactory::new(settings).create(&key)?;
            let record = store
                .session_record()?
                .with_context(|| format!("no session row for {key}"))?;
            println!("session:          {key}");
            println!("database:         {}", store.database().path().display());
            println!("creation time:    {}", record.creation_time.format("%Y-%m-%d %H:%M:%S"));
            println!("next sender seq:  {}", record.next_sender_seq);
            println!("next target seq:  {}", record.next_target_seq);
            println!("stored messages:  {}", store.message_count()?);
        }
        Command::Messages { key, begin, end } => {
            let store = StoreFactory::new(settings).create(&key)?;
            for raw in store.get_messages(begin, end)? {
                println!("{}", printable(&raw));
            }
        }
        Command::SetSender { key, seq } => {
            let mut store = StoreFactory::new(settings).create(&key)?;
            store.set_next_sender_seq(seq)?;
            tracing::info!(session = %key, seq, "next sender seq set");
        }
        Command::SetTarget { key, seq } => {
            let mut store = StoreFactory::new(settings).create(&key)?;
            store.set_next_target_seq(seq)?;
            tracing::info!(session = %key, seq, "next target seq set");
        }
        Command::Reset { key } => {
            let mut store = StoreFactory::new(settings).create(&key)?;
            store.reset()?;
        }
        Command::LogTail { key, stream, limit } => {
            let log = LogFactory::new(settings).create(&key)?;
            for entry in log.entries(stream, limit)? {
                println!(
                    "{} {}",
                    entry.time.format("%Y-%m-%d %H:%M:%S%.3f"),
                    printable(entry.text.as_bytes())
                );
            }
        }
        Command::LogClear { key } => {
            let factory = LogFactory::new(settings);
            let log = match &key {
                Some(key) => factory.create(key)?,
                None => factory.create_global()?,
            };
            let removed = log.clear()?;
            println!("removed {removed} rows");
        }
    }

    Ok(())
}

/// Render SOH field separators as `|`.
fn printable(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace('\x01', "|")
}
