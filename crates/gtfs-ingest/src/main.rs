//! GTFS Ingest - feed import tool

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gtfs_common::logging::{init_logging, LogConfig, LogLevel};
use gtfs_common::types::Source;
use gtfs_ingest::sync::load_metadata;
use gtfs_ingest::{initialize, ImportOptions, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolution of the overall progress bar
const BAR_LENGTH: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "gtfs-ingest")]
#[command(author, version, about = "Import GTFS feeds into a local document store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a feed (URL or local path to a .zip)
    Import(ImportArgs),

    /// Show when a feed was last synced
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Feed URL or path
    source: String,

    /// Document id prefix
    #[arg(short, long)]
    namespace: Option<String>,

    /// Re-import when the source reports a newer archive
    #[arg(long)]
    auto_update: bool,

    /// Delete the namespace and import from scratch
    #[arg(long)]
    wipe: bool,

    /// Records per storage write
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Feed URL or path
    source: String,

    /// Document id prefix
    #[arg(short, long)]
    namespace: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("gtfs-ingest")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Import(args) => import(args).await,
        Command::Status(args) => status(args).await,
    }
}

fn options_from(
    namespace: Option<String>,
    database: Option<PathBuf>,
) -> Result<ImportOptions> {
    let mut options = ImportOptions::from_env().context("Invalid GTFS_* environment")?;
    if let Some(namespace) = namespace {
        options = options.with_namespace(namespace);
    }
    if let Some(database) = database {
        options = options.with_database(database);
    }
    Ok(options)
}

async fn import(args: ImportArgs) -> Result<()> {
    let source = Source::from_arg(&args.source)?;

    let mut options = options_from(args.namespace, args.database)?;
    if args.auto_update {
        options = options.with_auto_update(true);
    }
    if args.wipe {
        options = options.with_wipe_existing(true);
    }
    if let Some(batch_size) = args.batch_size {
        options = options.with_batch_size(batch_size);
    }

    let cancel = CancellationToken::new();
    options = options.with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling import");
            cancel.cancel();
        }
    });

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        create_import_progress()?
    };
    let observer_bar = bar.clone();

    info!(source = %source, "Importing feed");
    let result = initialize(source, options, move |p: &ProgressSnapshot| {
        update_progress(&observer_bar, p)
    })
    .await;
    bar.finish_and_clear();

    let feed = result?;
    println!("{}", feed.report.summary());
    if let Some(last_updated) = feed.report.last_updated {
        println!("Feed last modified: {}", last_updated.to_rfc3339());
    }
    Ok(())
}

async fn status(args: StatusArgs) -> Result<()> {
    let source = Source::from_arg(&args.source)?;
    let options = options_from(args.namespace, args.database)?;

    let store = options.store.open()?;
    match load_metadata(store.as_ref(), &options.namespace, &source).await? {
        Some(metadata) => {
            println!("Source:        {}", metadata.url);
            println!("Namespace:     {}", options.namespace);
            println!(
                "Last modified: {}",
                metadata
                    .last_updated
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            if let Some(synced_at) = metadata.synced_at {
                println!("Synced at:     {}", synced_at.to_rfc3339());
            }
            println!("Documents:     {}", metadata.document_count);
            if let Some(digest) = metadata.archive_sha256 {
                println!("SHA-256:       {}", digest);
            }
        },
        None => println!("{} has never been synced into '{}'", source, options.namespace),
    }

    Ok(())
}

fn create_import_progress() -> Result<ProgressBar> {
    let bar = ProgressBar::new(BAR_LENGTH);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:>16} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:>3}%")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

fn update_progress(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    // Entry numbers are 1-based, so the raw fraction can run past 1.0
    let fraction = snapshot.total_percent.clamp(0.0, 1.0);
    bar.set_position((fraction * BAR_LENGTH as f64) as u64);
    bar.set_message(snapshot.step_name.clone());
}

