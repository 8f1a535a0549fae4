//! dochub command-line entry point.
//!
//! Logging goes to stderr so `open` can stream document bytes on
//! stdout without interference.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dochub_client::catalog::{Catalog, CatalogLoader, TAG_ALL};
use dochub_client::fetch::{Fetch, FetchClient, FetchConfig, normalize};
use dochub_core::freshness::is_stale;
use dochub_core::{CacheDb, Error, HubConfig, StoreKind};
use dochub_server::classify::ResourceRequest;
use dochub_server::prefetch::{Prefetcher, clear_all, collect_cacheable_resources};
use dochub_server::{Interceptor, spawn};

/// Offline-first document hub: prefetch a catalog of documents and
/// serve them from local storage when the network is gone.
#[derive(Parser, Debug)]
#[command(name = "dochub")]
#[command(about = "Offline document hub: prefetch, inspect, and read cached documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the app shell and every catalog document for offline use
    Prefetch,
    /// Show cache freshness and record counts
    Status,
    /// List catalog sections and documents
    List {
        /// Only show documents carrying this tag
        #[arg(long, default_value = TAG_ALL)]
        tag: String,
    },
    /// Resolve one URL through the interceptor and write the body
    Open {
        /// Absolute URL or path relative to the configured base
        url: String,
        /// Byte range to request, e.g. "bytes=0-1023"
        #[arg(long)]
        range: Option<String>,
        /// Treat the request as a top-level navigation
        #[arg(long)]
        navigate: bool,
        /// Accept header to send
        #[arg(long)]
        accept: Option<String>,
        /// Write the body to this file instead of stdout
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
    /// Remove every cached record and reset freshness state
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = HubConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let fetcher: Arc<dyn Fetch> = Arc::new(
        FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..FetchConfig::default()
        })
        .context("building fetch client")?,
    );

    match cli.command {
        Command::Prefetch => prefetch(&config, db, fetcher).await,
        Command::Status => status(&config, db, fetcher).await,
        Command::List { tag } => list(&config, fetcher, &tag).await,
        Command::Open { url, range, navigate, accept, output } => {
            open(&config, db, fetcher, OpenArgs { url, range, navigate, accept, output }).await
        }
        Command::Clear => {
            let removed = clear_all(&db).await?;
            println!("removed {removed} cached records");
            Ok(())
        }
    }
}

/// Fetch the catalog, substituting the offline fallback when the
/// manifest is unreachable or malformed.
async fn load_catalog(config: &HubConfig, fetcher: Arc<dyn Fetch>) -> Result<Catalog> {
    let base = url::Url::parse(&config.base_url)?;
    let manifest_url = normalize(&config.manifest_url, &base).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match CatalogLoader::new(fetcher).load(&manifest_url, &config.app_version).await {
        Ok(catalog) => Ok(catalog),
        Err(e) => {
            tracing::warn!(error = %e, "catalog unavailable, using empty offline fallback");
            Ok(Catalog::offline_fallback())
        }
    }
}

async fn prefetch(config: &HubConfig, db: CacheDb, fetcher: Arc<dyn Fetch>) -> Result<()> {
    let catalog = load_catalog(config, Arc::clone(&fetcher)).await?;
    let targets = collect_cacheable_resources(config, &catalog)?;
    if targets.is_empty() {
        println!("nothing to prefetch");
        return Ok(());
    }

    let prefetcher = Prefetcher::new(db, fetcher, config);
    let report = prefetcher
        .run(&targets, |done, total| {
            eprintln!("prefetch {done}/{total}");
        })
        .await?;

    let recorded = prefetcher.record_completion(&report, catalog.version.as_deref()).await?;

    println!(
        "prefetched {} of {} resources ({} failed)",
        report.succeeded, report.total, report.failed
    );
    if !report.all_succeeded() {
        println!("rerun prefetch to retry the failed resources");
    }
    if !recorded {
        println!("note: cache was cleared during the run; freshness not recorded");
    }
    Ok(())
}

async fn status(config: &HubConfig, db: CacheDb, fetcher: Arc<dyn Fetch>) -> Result<()> {
    let catalog = load_catalog(config, fetcher).await?;
    let state = db.get_freshness().await?;
    let shell = db.count_records(StoreKind::Shell).await?;
    let documents = db.count_records(StoreKind::Document).await?;

    println!("shell records:    {shell}");
    println!("document records: {documents}");
    match &state {
        Some(s) => {
            println!("last prefetch:    {} (unix ms)", s.last_prefetch_at);
            println!(
                "catalog version:  {} (cached: {})",
                catalog.version.as_deref().unwrap_or("unknown"),
                s.last_prefetched_version.as_deref().unwrap_or("unknown")
            );
        }
        None => println!("last prefetch:    never"),
    }

    let catalog_version = catalog.version.as_deref().unwrap_or_default();
    let stale = is_stale(state.as_ref(), catalog_version, config.max_age_ms, chrono::Utc::now());
    println!("stale:            {stale}");
    Ok(())
}

async fn list(config: &HubConfig, fetcher: Arc<dyn Fetch>, tag: &str) -> Result<()> {
    let catalog = load_catalog(config, fetcher).await?;
    for section in &catalog.sections {
        let items = section.items_matching(tag);
        if items.is_empty() {
            continue;
        }
        println!("{}", section.title);
        for item in items {
            println!("  {}  {}", item.label, item.url);
        }
    }
    Ok(())
}

struct OpenArgs {
    url: String,
    range: Option<String>,
    navigate: bool,
    accept: Option<String>,
    output: Option<std::path::PathBuf>,
}

async fn open(config: &HubConfig, db: CacheDb, fetcher: Arc<dyn Fetch>, args: OpenArgs) -> Result<()> {
    let base = url::Url::parse(&config.base_url)?;
    let url = normalize(&args.url, &base).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let interceptor = Interceptor::new(db, fetcher, config)?;
    let handle = spawn(interceptor).await?;

    let mut request = if args.navigate {
        ResourceRequest::navigation(url.as_str())
    } else {
        ResourceRequest::get(url.as_str())
    };
    if let Some(range) = args.range {
        request = request.with_range(range);
    }
    if let Some(accept) = args.accept {
        request = request.with_accept(accept);
    }

    let response = handle.resolve(request).await?;
    handle.shutdown().await;
    eprintln!(
        "{} {} ({} bytes, {:?})",
        response.status,
        response.content_type.as_deref().unwrap_or("unknown"),
        response.content_length(),
        response.source
    );

    if !response.is_success() {
        bail!("{}", String::from_utf8_lossy(&response.body));
    }

    match args.output {
        Some(path) => {
            std::fs::write(&path, &response.body).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            std::io::stdout().write_all(&response.body)?;
        }
    }
    Ok(())
}
