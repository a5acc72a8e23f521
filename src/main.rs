use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use feedpull::config::Config;
use feedpull::feed::HttpFeedFetcher;
use feedpull::pull::{should_fetch, PullOutcome, Puller};
use feedpull::storage::{Database, FeedFilter, RequestOptions};
use feedpull::util::{validate_feed_url, validate_proxy_url};

#[derive(Parser, Debug)]
#[command(name = "feedpull", version, about = "Background RSS/Atom feed puller")]
struct Args {
    /// Config file (default: ~/.config/feedpull/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep all feeds now and then once per interval until interrupted
    Run,
    /// Pull once and exit
    Pull {
        /// Pull a single feed, ignoring failure and interval checks
        #[arg(long, conflicts_with = "all")]
        id: Option<i64>,
        /// Sweep every feed (the default)
        #[arg(long)]
        all: bool,
        /// Also pull feeds that failed last time or were pulled recently
        #[arg(long, conflicts_with = "id")]
        force: bool,
    },
    /// Subscribe to a feed and pull it
    Add {
        url: String,
        /// Display name (default: the feed's own title)
        #[arg(long)]
        name: Option<String>,
        /// Route requests for this feed through a proxy
        #[arg(long, value_name = "URL")]
        proxy: Option<String>,
        /// Skip fetching the feed before subscribing
        #[arg(long)]
        no_check: bool,
    },
    /// List feeds, their item counts and last outcome
    List,
    /// Show a feed's stored items, newest first
    Items {
        id: i64,
        /// Maximum number of items to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Stop pulling a feed
    Suspend { id: i64 },
    /// Resume pulling a suspended feed
    Resume { id: i64 },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Config::default_path(),
    };
    let config = match path {
        Some(p) => Config::load(&p)
            .with_context(|| format!("Failed to load config from '{}'", p.display()))?,
        None => {
            tracing::debug!("HOME not set, using default configuration");
            Config::default()
        }
    }
    .with_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn open_database(config: &Config) -> Result<Database> {
    let path = config.resolve_database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory '{}'", parent.display())
        })?;
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    Database::open(path_str)
        .await
        .with_context(|| format!("Failed to open database '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedpull=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let db = open_database(&config).await?;

    let fetcher = Arc::new(
        HttpFeedFetcher::new(&config.user_agent).context("Failed to build HTTP client")?,
    );
    let store = Arc::new(db.clone());
    let puller = Puller::new(
        fetcher.clone(),
        store.clone(),
        store,
        config.puller_settings(),
    );

    match args.command {
        Command::Run => {
            tokio::select! {
                _ = puller.run() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl+C")?;
                    tracing::info!("Interrupted, shutting down");
                }
            }
        }
        Command::Pull { id: Some(id), .. } => {
            let outcome = puller
                .pull_one(id)
                .await
                .with_context(|| format!("Failed to pull feed {}", id))?;
            println!("{}", describe(&outcome));
        }
        Command::Pull { id: None, force, .. } => {
            let errors = puller.pull_all(force).await.context("Pull sweep failed")?;
            if !errors.is_empty() {
                anyhow::bail!("{} feed(s) could not be pulled", errors.len());
            }
        }
        Command::Add {
            url,
            name,
            proxy,
            no_check,
        } => {
            let url = validate_feed_url(&url).context("Refusing feed URL")?;
            if let Some(proxy) = &proxy {
                validate_proxy_url(proxy).context("Refusing proxy URL")?;
            }

            let mut name = name;
            if !no_check {
                let options = RequestOptions {
                    proxy: proxy.clone(),
                    ..RequestOptions::default()
                };
                let title = fetcher
                    .fetch_title(url.as_str(), &options)
                    .await
                    .with_context(|| format!("'{}' is not a readable feed", url))?;
                name = name.or(title);
            }

            let id = db
                .insert_feed(url.as_str(), name.as_deref(), proxy.as_deref())
                .await
                .context("Failed to save feed")?;
            println!("Added feed {} ({})", id, url);

            let errors = puller.pull_new(&[id]).await.context("Initial pull failed")?;
            if let Some(e) = errors.first() {
                anyhow::bail!("Initial pull of feed {} failed: {}", id, e.error);
            }
        }
        Command::List => {
            let feeds = db
                .list_feeds(&FeedFilter::default())
                .await
                .context("Failed to list feeds")?;
            let now = chrono::Utc::now();
            let interval = puller.settings().interval;
            for feed in feeds {
                let status = if feed.suspended {
                    "suspended".to_string()
                } else if let Some(message) = feed.failure.message() {
                    format!("failed: {}", message)
                } else {
                    "ok".to_string()
                };
                let due = if should_fetch(&feed, now, interval, false) { "*" } else { " " };
                let count = db
                    .count_items(feed.id)
                    .await
                    .with_context(|| format!("Failed to count items of feed {}", feed.id))?;
                println!(
                    "{:>4}{} {:<24}  {:>5}  {}  [{}]",
                    feed.id,
                    due,
                    feed.display_name(),
                    count,
                    feed.link.as_deref().unwrap_or("-"),
                    status
                );
            }
        }
        Command::Items { id, limit } => {
            let feed = db
                .get_feed(id)
                .await
                .with_context(|| format!("Failed to load feed {}", id))?;
            let items = db
                .get_items_for_feed(feed.id, Some(limit))
                .await
                .with_context(|| format!("Failed to list items of feed {}", id))?;
            println!("{} ({} shown)", feed.display_name(), items.len());
            for item in items {
                let date = item
                    .pub_date
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                println!(
                    "{}  {}  {}",
                    date,
                    item.title,
                    item.link.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Suspend { id } => {
            db.set_suspended(id, true)
                .await
                .with_context(|| format!("Failed to suspend feed {}", id))?;
            println!("Suspended feed {}", id);
        }
        Command::Resume { id } => {
            db.set_suspended(id, false)
                .await
                .with_context(|| format!("Failed to resume feed {}", id))?;
            println!("Resumed feed {}", id);
        }
    }

    Ok(())
}

fn describe(outcome: &PullOutcome) -> String {
    match outcome {
        PullOutcome::Skipped(reason) => format!("skipped: {}", reason),
        PullOutcome::Fetched { inserted } => format!("fetched, {} new item(s)", inserted),
        PullOutcome::Unchanged => "unchanged".to_string(),
        PullOutcome::FetchFailed { message } => format!("fetch failed: {}", message),
    }
}
