//! sitewatch CLI
//!
//! Local entry point: one-shot crawls, watching a site for changes, and
//! config validation.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sitewatch::{
    error::Result,
    models::{Config, TaskSpec},
    pipeline,
    scheduler::TaskManager,
    services::CrawlOptions,
};

/// sitewatch - Site crawler and change detector
#[derive(Parser, Debug)]
#[command(
    name = "sitewatch",
    version,
    about = "Crawl a site and watch it for meaningful content changes"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "sitewatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site once and print its summary
    Crawl {
        url: String,

        /// Maximum pages to fetch (default: from config)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum link depth from the base URL (default: from config)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Stop after downloading this many body bytes
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Skip URLs containing this substring (repeatable)
        #[arg(long)]
        avoid: Vec<String>,

        /// Print the full crawl result as JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// Recrawl a site on an interval and report changes until Ctrl-C
    Watch {
        url: String,

        /// Seconds between crawls (default: from config)
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum pages to fetch per crawl (default: from config)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum link depth from the base URL (default: from config)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Stop each crawl after downloading this many body bytes
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Skip URLs containing this substring (repeatable)
        #[arg(long)]
        avoid: Vec<String>,

        /// Write the summary to this file whenever it changes
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the config file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Crawl {
            url,
            max_pages,
            max_depth,
            max_bytes,
            avoid,
            json,
        } => {
            config.validate()?;
            let mut options = CrawlOptions::from_config(&config.crawler);
            options.max_pages = max_pages.unwrap_or(options.max_pages);
            options.max_depth = max_depth.unwrap_or(options.max_depth);
            options.max_bytes = max_bytes;
            options.avoid = avoid;

            let result = pipeline::run_crawl(&config, &url, &options).await?;
            log::info!(
                "Fetched {} pages, abandoned {}, discovered {}",
                result.stats.fetched,
                result.stats.abandoned,
                result.stats.discovered
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", pipeline::render_tree(&result.tree));
            }
        }

        Command::Watch {
            url,
            interval,
            max_pages,
            max_depth,
            max_bytes,
            avoid,
            output,
        } => {
            let mut spec = TaskSpec::from_config(url, &config).with_avoid(avoid);
            if let Some(interval) = interval {
                spec = spec.with_interval(interval);
            }
            if let Some(max_pages) = max_pages {
                spec = spec.with_max_pages(max_pages);
            }
            if let Some(max_depth) = max_depth {
                spec = spec.with_max_depth(max_depth);
            }
            if let Some(max_bytes) = max_bytes {
                spec = spec.with_max_bytes(max_bytes);
            }
            watch(&config, spec, output).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} volatile selectors, {} text patterns)",
                config.fingerprint.volatile_selectors.len(),
                config.fingerprint.text_patterns.len()
            );
        }
    }

    Ok(())
}

/// Register one task, run it right away, then report changes as the
/// scheduler picks them up.
async fn watch(config: &Config, spec: TaskSpec, output: Option<PathBuf>) -> Result<()> {
    let poll = Duration::from_secs(spec.interval_secs.clamp(1, 10));
    let tasks = TaskManager::from_config(config)?;
    let id = tasks.create_task(spec)?;

    if let Err(e) = tasks.run_now(id).await {
        log::warn!("Initial run failed: {}", e);
    }
    let mut seen = None;

    loop {
        if let Some(record) = tasks.get_task(id) {
            if record.last_changed != seen {
                seen = record.last_changed;
                if let Some(at) = seen {
                    log::info!("Change detected in {} at {}", record.spec.base_url, at);
                }
                if let Some(summary) = &record.output {
                    match &output {
                        Some(path) => {
                            tokio::fs::write(path, summary.as_bytes()).await?;
                            log::info!("Summary written to {}", path.display());
                        }
                        None => print!("{}", summary),
                    }
                }
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(poll) => {}
        }
    }

    tasks.shutdown();
    Ok(())
}
