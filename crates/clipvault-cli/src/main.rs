//! clipvault: command-line backup and restore for a clip collection.
//!
//! The collection lives in a JSON store file. `restore` imports any
//! supported backup dialect into it, `backup` writes a native backup, and
//! `detect` reports what a restore would do without touching the store.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::fs::{File, OpenOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipvault_backup::{BackupConfig, BackupCoordinator};
use clipvault_core::{BackupItemType, BackupStats};
use clipvault_formats::{ProcessorRegistry, SourceBuffer};
use clipvault_store::MemoryStore;

#[derive(Parser)]
#[command(name = "clipvault")]
#[command(author, version, about = "Backup and restore for clipvault collections")]
#[command(propagate_version = true)]
struct Cli {
    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a backup file into the store
    Restore {
        /// Backup file in any supported format
        file: PathBuf,

        /// Store file (created if missing)
        #[arg(short, long, env = "CLIPVAULT_STORE", default_value = "clipvault.json")]
        store: PathBuf,
    },

    /// Write a native backup of the store
    Backup {
        /// Store file
        #[arg(short, long, env = "CLIPVAULT_STORE", default_value = "clipvault.json")]
        store: PathBuf,

        /// Output file or directory (default: generated name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Categories to include, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        only: Vec<BackupItemType>,
    },

    /// Show which format a file is in and what restoring it would import
    Detect {
        /// File to inspect
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
///
/// `RUST_LOG` overrides the default filter; `CLIPVAULT_LOG_FORMAT=json`
/// switches to one JSON object per line.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clipvault=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let json = std::env::var("CLIPVAULT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Restore { file, store } => cmd_restore(&file, &store, cli.json).await,
        Commands::Backup {
            store,
            output,
            only,
        } => cmd_backup(&store, output, only, cli.json).await,
        Commands::Detect { file } => cmd_detect(&file, cli.json).await,
    }
}

async fn open_store(path: &Path) -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::open(path)
        .await
        .with_context(|| format!("opening store {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn cmd_restore(file: &Path, store_path: &Path, json: bool) -> Result<()> {
    let store = open_store(store_path).await?;
    let coordinator =
        BackupCoordinator::with_standard_registry(Arc::clone(&store), BackupConfig::from_env());

    let source = File::open(file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let stats = coordinator
        .restore(source, file.to_str())
        .await
        .with_context(|| format!("restoring {}", file.display()))?;

    if !stats.is_empty() {
        store
            .persist(store_path)
            .await
            .with_context(|| format!("saving store {}", store_path.display()))?;
    }

    print_stats(&stats, json, "Nothing to restore.")?;
    if stats.settings && !json {
        println!("Settings were restored. Restart clipvault to apply them.");
    }
    Ok(())
}

async fn cmd_backup(
    store_path: &Path,
    output: Option<PathBuf>,
    only: Vec<BackupItemType>,
    json: bool,
) -> Result<()> {
    let store = open_store(store_path).await?;
    let coordinator =
        BackupCoordinator::with_standard_registry(Arc::clone(&store), BackupConfig::from_env());

    let selection = if only.is_empty() {
        BackupItemType::ALL.to_vec()
    } else {
        only
    };

    let file_name = coordinator.backup_file_name(chrono::Utc::now());
    let (path, generated) = match output {
        Some(dir) if is_dir(&dir).await => (dir.join(file_name), true),
        Some(path) => (path, false),
        None => (PathBuf::from(file_name), true),
    };

    // Generated names never replace an existing backup.
    let target = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(!generated)
        .create_new(generated)
        .open(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let stats = match coordinator.backup(&selection, target).await {
        Ok(stats) => stats,
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e).with_context(|| format!("writing backup {}", path.display()));
        }
    };

    info!(subsystem = "cli", path = %path.display(), "Backup written");
    if !json {
        println!("Backup written to {}", path.display());
    }
    print_stats(&stats, json, "Backup is empty.")
}

async fn cmd_detect(file: &Path, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let registry = ProcessorRegistry::standard(BackupConfig::from_env().limits());
    let source = SourceBuffer::new(bytes).with_name(file.display().to_string());

    let matched = registry
        .detect(source)
        .with_context(|| format!("inspecting {}", file.display()))?;
    let kind = matched.kind();
    let stats = matched.parse(chrono::Utc::now()).stats();

    if json {
        let report = serde_json::json!({
            "format": kind.as_str(),
            "stats": slim(&stats),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Format: {}", kind);
    print_stats(&stats, false, "Nothing to restore.")
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Stats without the clip list, for printing.
fn slim(stats: &BackupStats) -> BackupStats {
    BackupStats {
        clips: Vec::new(),
        ..stats.clone()
    }
}

fn print_stats(stats: &BackupStats, json: bool, empty_message: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&slim(stats))?);
    } else if stats.is_empty() {
        println!("{}", empty_message);
    } else {
        println!("{}", stats.summary());
    }
    Ok(())
}
