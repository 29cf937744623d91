use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mangaprobe::browser::http::HttpPage;
use mangaprobe::cache::ResultCache;
use mangaprobe::config::AppConfig;
use mangaprobe::{ProviderId, ScraperFactory};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "mangaprobe")]
#[command(about = "Search manga sites, read series details and resolve chapter page images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "mangaprobe.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported providers and their base URLs
    Providers,
    /// Search a provider, or list its catalogue when no term is given
    Search {
        provider: String,
        term: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Show series metadata and the chapter list
    Series { provider: String, url: String },
    /// Resolve the ordered page images of a chapter
    Chapter { provider: String, url: String },
    /// Drop every cached result of a provider
    CacheClear { provider: String },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Serialize)]
struct PageLine<'a> {
    page_index: u32,
    file_name: String,
    image_url: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = AppConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config))?;
    debug!("Loaded configuration from {}", cli.config);
    let factory = ScraperFactory::new(&config.cache);

    match cli.command {
        Commands::Providers => {
            for id in ScraperFactory::supported() {
                let scraper = factory.create(*id, config.provider_overrides(id.as_str()))?;
                println!("{:<12} {}", id, scraper.config().base_url);
            }
        }
        Commands::Search { provider, term, page } => {
            let id: ProviderId = provider.parse()?;
            let scraper = factory.create(id, config.provider_overrides(id.as_str()))?;
            let mut browser = HttpPage::new(&config.http)?;
            let term = term.unwrap_or_default();

            let result = scraper.search(&mut browser, &term, page).await?;
            info!("{} series on page {} (next page: {})", result.results.len(), result.current_page, result.has_next_page);
            print_json(&result)?;
        }
        Commands::Series { provider, url } => {
            let id: ProviderId = provider.parse()?;
            let scraper = factory.create(id, config.provider_overrides(id.as_str()))?;
            let mut browser = HttpPage::new(&config.http)?;

            let detail = scraper.get_series_details(&mut browser, &url).await?;
            info!("'{}' lists {} chapters", detail.title, detail.chapters.len());
            print_json(&detail)?;
        }
        Commands::Chapter { provider, url } => {
            let id: ProviderId = provider.parse()?;
            let scraper = factory.create(id, config.provider_overrides(id.as_str()))?;
            let mut browser = HttpPage::new(&config.http)?;

            let pages = scraper.get_chapter_pages(&mut browser, &url).await?;
            match pages.strategy {
                Some(strategy) => info!("{} pages via {}", pages.len(), strategy),
                None => info!("No pages found for {}", url),
            }
            let output = &scraper.config().output;
            let lines: Vec<PageLine<'_>> = pages
                .pages
                .iter()
                .map(|page| PageLine {
                    page_index: page.page_index,
                    file_name: output.page_file_name(page.page_index),
                    image_url: &page.image_url,
                })
                .collect();
            print_json(&serde_json::json!({
                "strategy": pages.strategy,
                "referer": scraper.config().referer(),
                "directory": output.directory,
                "pages": lines,
            }))?;
        }
        Commands::CacheClear { provider } => {
            let id: ProviderId = provider.parse()?;
            let ttl = std::time::Duration::from_secs(config.cache.detail_ttl_secs);
            let cache = ResultCache::new(&config.cache.directory, id.as_str(), ttl);
            cache.evict_namespace();
            println!("Cleared cache for {}", id);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("mangaprobe={}", level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
