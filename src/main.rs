//! mpm: a small personal media catalog.
//!
//! Photos, albums and tags live in memory and are mirrored to one JSON file
//! per kind. A generation pipeline seeds the catalog, a background task
//! flushes pending changes, and a monitor reports newly stored records.

#![warn(clippy::all)]

mod cli;
mod config;
mod models;
mod monitor;
mod pipeline;
mod repository;
mod shutdown;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{AlbumCommand, AlbumFields, Command, RunArgs};
use config::Config;
use models::{Album, EntityKind};
use monitor::{Monitor, DEFAULT_MONITOR_PERIOD};
use pipeline::{EntityService, DEFAULT_GENERATE_INTERVAL};
use repository::{Repository, RepositoryError};

async fn open_repository(config: &Config) -> Repository {
    tracing::debug!(
        storage = config.storage_kind.as_str(),
        data_dir = %config.data_dir.display(),
        save_interval = ?config.save_interval,
        "Opening catalog"
    );
    Repository::open(config.storage_kind, &config.data_dir, config.save_interval).await
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Long-running mode: autosave, monitor and scheduled generation until a
/// shutdown signal arrives.
async fn run_service(config: &Config, args: RunArgs) -> anyhow::Result<()> {
    let generate_interval = match args.generate_interval.as_deref() {
        Some(raw) => config::parse_interval(raw).context("Invalid --generate-interval")?,
        None => DEFAULT_GENERATE_INTERVAL,
    };

    let repo = Arc::new(open_repository(config).await);
    let shutdown = shutdown::install_signal_handler();

    let autosave = repo.init_storage(shutdown.clone());
    let monitor = Monitor::new(Arc::clone(&repo), DEFAULT_MONITOR_PERIOD);
    monitor.start(&shutdown);

    let service = EntityService::new(Arc::clone(&repo));
    tracing::info!(
        storage = config.storage_kind.as_str(),
        data_dir = %config.data_dir.display(),
        "Catalog service started"
    );

    if args.once {
        match service.generate_and_save(&shutdown).await {
            Ok(_) | Err(RepositoryError::Cancelled) => {}
            Err(e) => return Err(e.into()),
        }
        shutdown.cancelled().await;
    } else {
        service.run_scheduled(shutdown.clone(), generate_interval).await;
    }

    monitor.stop().await;
    match autosave {
        Some(handle) => {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Autosave task failed");
            }
        }
        None => {
            repo.persist_data()
                .await
                .context("Final save on shutdown failed")?;
        }
    }

    tracing::info!("Catalog service stopped");
    Ok(())
}

async fn run_generate(config: &Config) -> anyhow::Result<()> {
    let service = EntityService::new(Arc::new(open_repository(config).await));

    let stats = service.generate_and_save(&CancellationToken::new()).await?;
    service
        .repository()
        .persist_data()
        .await
        .context("Failed to save catalog")?;

    println!(
        "Saved {} album(s), {} tag(s), {} photo(s)",
        stats.albums, stats.tags, stats.photos
    );
    if stats.failed_batches > 0 {
        anyhow::bail!("{} batch(es) failed to save", stats.failed_batches);
    }
    Ok(())
}

async fn run_status(config: &Config) -> anyhow::Result<()> {
    let repo = open_repository(config).await;
    let albums = repo.all_albums(&CancellationToken::new()).await?;
    let counts = repo.entity_counts();

    println!("Catalog: {}", config.data_dir.display());
    println!("Storage: {}", config.storage_kind.as_str());
    println!();
    println!("  Photos: {}", counts.photos);
    println!("  Albums: {}", albums.len());
    println!("  Tags:   {}", counts.tags);
    Ok(())
}

async fn run_list(config: &Config, kind: &str) -> anyhow::Result<()> {
    let repo = open_repository(config).await;
    let kind = EntityKind::from_name(kind)
        .ok_or_else(|| explain(RepositoryError::UnrecognizedKind(kind.to_string())))?;
    match kind {
        EntityKind::Photo => print_json(&repo.all_photos()),
        EntityKind::Album => print_json(&repo.all_albums(&CancellationToken::new()).await?),
        EntityKind::Tag => print_json(&repo.all_tags()),
    }
}

async fn run_show(config: &Config, kind: &str, id: i64) -> anyhow::Result<()> {
    let repo = open_repository(config).await;
    let entity = repo
        .find_entity(&CancellationToken::new(), kind, id)
        .await
        .map_err(explain)?;
    print_json(&entity)
}

fn album_from_fields(fields: AlbumFields) -> Album {
    Album {
        tags: fields.tags,
        ..Album::new(fields.name, fields.description)
    }
}

/// Attach a hint to lookup failures the user can act on.
fn explain(e: RepositoryError) -> anyhow::Error {
    match e {
        RepositoryError::UnrecognizedKind(_) => {
            let kinds: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
            anyhow::Error::new(e).context(format!("Expected one of: {}", kinds.join(", ")))
        }
        e if e.is_not_found() => {
            anyhow::Error::new(e).context("Run `mpm albums list` or `mpm status` to see what exists")
        }
        e => e.into(),
    }
}

async fn run_albums(config: &Config, command: AlbumCommand) -> anyhow::Result<()> {
    let repo = open_repository(config).await;
    let cancel = CancellationToken::new();

    match command {
        AlbumCommand::List => print_json(&repo.all_albums(&cancel).await?),
        AlbumCommand::Add(fields) => {
            let id = repo.add_album(&cancel, album_from_fields(fields)).await?;
            println!("{}", id);
            Ok(())
        }
        AlbumCommand::Update { id, fields } => {
            let album = repo
                .update_album(&cancel, id, album_from_fields(fields))
                .await
                .map_err(explain)?;
            print_json(&album)
        }
        AlbumCommand::Delete { id } => {
            repo.delete_album(&cancel, id).await.map_err(explain)?;
            println!("Deleted album {}", id);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(&cli.storage)?;

    match cli.command {
        Command::Run(args) => run_service(&config, args).await,
        Command::Generate => run_generate(&config).await,
        Command::Status => run_status(&config).await,
        Command::List { kind } => run_list(&config, &kind).await,
        Command::Show { kind, id } => run_show(&config, &kind, id).await,
        Command::Albums(command) => run_albums(&config, command).await,
    }
}
