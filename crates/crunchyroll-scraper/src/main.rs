//! Crunchyroll Scraper CLI application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crunchyroll_scraper::archive::{canonical_url, ArchiveSearch};
use crunchyroll_scraper::error::cancellable;
use crunchyroll_scraper::{
    ArchiveSettings, CrunchyrollClient, FileAvatarCache, IdResolver, SyncEngine, WaybackClient,
};
use shared::{Config, DataPaths, Database, MetadataRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Catalog locale, overriding the configured one
    #[arg(short, long)]
    language: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the series id of a series folder
    Title {
        /// Series folder path
        folder: PathBuf,
    },
    /// Synchronize the cached season and episode tree of a series
    Sync { series_id: String },
    /// Resolve the season id of a season folder
    Season {
        series_id: String,
        folder: String,
        /// Season number from the media library
        #[arg(short, long)]
        number: Option<i32>,
    },
    /// Resolve the episode id of a video file
    Episode {
        series_id: String,
        season_id: String,
        file: String,
        /// Episode number from the media library
        #[arg(short, long)]
        number: Option<i32>,
    },
    /// List archived captures of a series or episode page
    Snapshots {
        #[arg(value_enum)]
        page: PageKind,
        /// Series or episode id
        id: String,
        /// Slug of the page URL
        slug: String,
    },
    /// Show database and avatar cache statistics
    Stats,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PageKind {
    Series,
    Episode,
}

impl PageKind {
    fn path_segment(self) -> &'static str {
        match self {
            PageKind::Series => "series",
            PageKind::Episode => "watch",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    shared::logging::init(shared::LogConfig::from_config(
        &config,
        "crunchyroll-scraper",
        args.verbose,
    ))?;

    info!(config_file = %args.config.display(), "Crunchyroll Scraper starting");

    let data_paths = DataPaths::new(config.data_dir());
    data_paths
        .create_dirs()
        .context("Failed to create data directories")?;

    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let repository = Arc::new(MetadataRepository::new(database));

    let language = args
        .language
        .clone()
        .unwrap_or_else(|| config.crunchyroll.language.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    if let Command::Stats = args.command {
        return print_stats(&config, &repository);
    }

    let catalog = Arc::new(
        CrunchyrollClient::new(
            config.crunchyroll.base_url.clone(),
            config.crunchyroll.access_token.clone(),
            config.crunchyroll.rate_limit.requests_per_second,
            config.crunchyroll.rate_limit.requests_per_minute,
            config.crunchyroll.max_retries,
            config.crunchyroll.retry_delay_ms,
        )
        .context("Failed to create catalog client")?,
    );
    let sync = Arc::new(SyncEngine::new(
        catalog.clone(),
        repository.clone(),
        config.staleness_threshold(),
    ));
    let resolver = IdResolver::new(catalog, repository.clone(), sync.clone());

    match args.command {
        Command::Title { folder } => {
            let name = folder_name(&folder);
            let id = resolver
                .resolve_title_id(&name, &folder.to_string_lossy(), &language, &cancel)
                .await
                .context("Series resolution failed")?;
            print_resolution("Series", &name, id);
        }
        Command::Sync { series_id } => {
            sync.sync_title_metadata(&series_id, &language, &cancel)
                .await
                .context("Title sync failed")?;

            match repository.get_title_metadata(&series_id, &language)? {
                Some(title) => {
                    println!("{} ({})", title.title, title.crunchyroll_id);
                    for season in &title.seasons {
                        println!(
                            "  Season {} [{}] {}: {} episodes",
                            season.season_number,
                            season.id,
                            season.title,
                            season.episodes.len()
                        );
                    }
                }
                None => println!("No metadata cached for {}", series_id),
            }
        }
        Command::Season {
            series_id,
            folder,
            number,
        } => {
            sync.sync_title_metadata(&series_id, &language, &cancel)
                .await
                .context("Title sync failed")?;
            let id = resolver
                .resolve_season_id(&series_id, &folder, number, &language, &cancel)
                .await
                .context("Season resolution failed")?;
            print_resolution("Season", &folder, id);
        }
        Command::Episode {
            series_id,
            season_id,
            file,
            number,
        } => {
            sync.sync_title_metadata(&series_id, &language, &cancel)
                .await
                .context("Title sync failed")?;
            let id = resolver
                .resolve_episode_id(&season_id, &series_id, &file, number, &language, &cancel)
                .await
                .context("Episode resolution failed")?;
            print_resolution("Episode", &file, id);
        }
        Command::Snapshots { page, id, slug } => {
            print_snapshots(&config, page, &id, &slug, &language, &cancel).await?;
        }
        Command::Stats => {}
    }

    info!("Crunchyroll Scraper finished successfully");
    Ok(())
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.to_string_lossy().to_string())
}

fn print_resolution(kind: &str, name: &str, id: Option<String>) {
    match id {
        Some(id) if !id.is_empty() => println!("{} '{}' -> {}", kind, name, id),
        _ => println!("{} '{}' -> no match", kind, name),
    }
}

async fn print_snapshots(
    config: &Config,
    page: PageKind,
    id: &str,
    slug: &str,
    language: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let settings = ArchiveSettings::from_config(&config.crunchyroll, &config.archive);
    let wayback =
        WaybackClient::from_config(&config.archive).context("Failed to create archive client")?;

    let url = canonical_url(&settings.site_url, language, page.path_segment(), id, slug);
    let mut snapshots = cancellable(cancel, wayback.search(&url, settings.cutoff_date))
        .await
        .with_context(|| format!("Archive search failed for {}", url))?;
    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    info!(url = %url, snapshots = snapshots.len(), cutoff = %settings.cutoff_date, "Archived captures");
    for snapshot in &snapshots {
        println!(
            "{} {} {}",
            snapshot.timestamp,
            snapshot
                .status_code
                .map_or_else(|| "-".to_string(), |code| code.to_string()),
            snapshot.archive_url(&settings.web_url, &url)
        );
    }
    Ok(())
}

fn print_stats(config: &Config, repository: &MetadataRepository) -> Result<()> {
    let stats = repository
        .get_stats()
        .context("Failed to get repository stats")?;
    info!("=== Metadata Statistics ===");
    info!("Titles cached: {}", stats.titles);
    info!("Titles with archived reviews: {}", stats.titles_with_reviews);
    info!("Episodes with archived comments: {}", stats.episodes_with_comments);

    let avatars = FileAvatarCache::new(config.avatar_cache_dir())
        .context("Failed to initialize avatar cache")?;
    let cache_stats = avatars.stats().context("Failed to get avatar cache stats")?;
    info!(
        cached_files = cache_stats.total_files,
        cache_size_mb = cache_stats.total_size_bytes / 1_000_000,
        "Avatar cache statistics"
    );
    Ok(())
}
