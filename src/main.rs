//! # news_pool
//!
//! Search news for a query, then download, parse and summarize every result
//! article concurrently.
//!
//! ## Usage
//!
//! ```sh
//! news_pool "Donald Trump" --pages 1 -j ./json
//! ```
//!
//! ## Pipeline
//!
//! 1. **Search**: fetch `pages` news result pages and collect outbound links
//! 2. **Pull**: one job per link on a bounded worker pool (40 by default);
//!    each job retries its download, parses and summarizes the article
//! 3. **Report**: print counts and optionally write a JSON report

use std::error::Error;

use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use news_pool::cli::Cli;
use news_pool::config::AppConfig;
use news_pool::models::SearchReport;
use news_pool::news::News;
use news_pool::outputs::json;
use news_pool::scrapers::http_client;
use news_pool::utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_pool starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);
    debug!(?config, "Effective configuration");

    // Early check: fail before scraping if the report cannot be written
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e);
        }
    }

    let client = http_client(&config.http.user_agent, config.http_timeout())?;
    let mut news = News::new(
        config.pages,
        config.lang.clone(),
        client,
        config.http_retry()?,
        config.article_pool(),
    )?;

    // ---- Search ----
    news.search(&args.query, &config.search).await?;

    // ---- Pull articles ----
    let report = news.get_article_data().await?;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some article downloads failed");
    }
    let articles = news.articles().await;

    println!("Number of Search Results: {}", news.results().len());
    println!("Number of Articles: {}", articles.len());

    // ---- Output ----
    if let Some(dir) = &args.json_output_dir {
        let now = Local::now();
        let search_report = SearchReport {
            query: args.query.clone(),
            local_date: now.date_naive().to_string(),
            local_time: now.time().to_string(),
            result_count: news.results().len(),
            articles,
        };
        json::write_report(&search_report, dir).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        results = news.results().len(),
        failed_downloads = news.failed_downloads(),
        "Execution complete"
    );
    Ok(())
}
