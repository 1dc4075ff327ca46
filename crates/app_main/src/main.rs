//! Media Viewer - thumbnail cache command line
//!
//! Runs the thumbnail commands against the configured cache and prints
//! `thumbnail-update` events as JSON lines on stdout.

use anyhow::Result;
use app_core::{
    event_channel, AppConfig, EventReceiver, ThumbnailService, ThumbnailUpdate,
    THUMBNAIL_UPDATE_EVENT,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "mv")]
#[command(about = "Media Viewer thumbnail cache")]
struct Args {
    /// Additional library root to track (repeatable)
    #[arg(long = "root", global = true)]
    roots: Vec<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate thumbnails for a directory
    Generate {
        dir: String,
        /// Session id; defaults to a freshly minted one
        #[arg(long)]
        session: Option<u64>,
    },
    /// Delete thumbnails whose source is gone or outside the tracked roots
    CleanupOrphans {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Delete thumbnails of everything under a directory
    CleanupDir { dir: String },
    /// Delete every thumbnail
    DeleteAll {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct EventLine<'a> {
    event: &'a str,
    payload: &'a ThumbnailUpdate,
}

fn spawn_event_printer(rx: EventReceiver) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("event-printer".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            for update in rx {
                let line = EventLine {
                    event: THUMBNAIL_UPDATE_EVENT,
                    payload: &update,
                };
                match serde_json::to_string(&line) {
                    Ok(json) => {
                        let _ = writeln!(stdout.lock(), "{}", json);
                    }
                    Err(e) => tracing::warn!("Failed to serialize event: {}", e),
                }
            }
        })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and panic hook first
    app_log::init()?;

    // Clean up old logs (7 days)
    if let Err(e) = app_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    let args = Args::parse();
    tracing::info!("Media Viewer starting...");

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }),
    };

    let (events, rx) = event_channel();
    let printer = spawn_event_printer(rx)?;

    let service = Arc::new(ThumbnailService::open(config, events)?);
    for root in &args.roots {
        service.add_root(root);
    }

    let outcome = run(service.clone(), args.command).await;

    // The printer stops once the last publisher is gone
    drop(service);
    if printer.join().is_err() {
        tracing::warn!("Event printer panicked");
    }

    outcome
}

async fn run(service: Arc<ThumbnailService>, command: Command) -> Result<()> {
    match command {
        Command::Generate { dir, session } => {
            let startup = app_core::spawn_startup_cleanup(service.clone());
            let session_id = session.unwrap_or_else(|| service.start_session(&dir));
            let summary = app_core::generate_thumbnails(service, dir, session_id).await?;
            if let Some(handle) = startup {
                handle.await?;
            }
            print_json(&summary)
        }
        Command::CleanupOrphans { cache_dir } => {
            let summary = app_core::cleanup_orphan_thumbnails(service, cache_dir).await?;
            print_json(&summary)
        }
        Command::CleanupDir { dir } => {
            let summary = app_core::cleanup_thumbnails_for_dir(service, dir).await?;
            print_json(&summary)
        }
        Command::DeleteAll { cache_dir } => {
            let summary = app_core::delete_all_thumbnails(service, cache_dir).await?;
            print_json(&summary)
        }
    }
}
