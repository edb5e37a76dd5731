//! Command-line interface definitions.
//!
//! Every option can also come from the YAML config file (`--config`); flags
//! given on the command line win over file values.

use clap::Parser;

use crate::scrapers::search::TimePeriod;

/// Search news for a query and pull every result article in parallel.
///
/// # Examples
///
/// ```sh
/// news_pool "Donald Trump"
/// news_pool "climate" --pages 3 --time-period week -j ./json
/// NEWS_POOL_MAX_WORKERS=8 news_pool "rust language" --retries 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search query
    #[arg(env = "NEWS_POOL_QUERY")]
    pub query: String,

    /// Number of result pages to fetch
    #[arg(short, long)]
    pub pages: Option<u32>,

    /// Interface language of the search
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Top-level domain of the search host (com, co.uk, ...)
    #[arg(long)]
    pub area: Option<String>,

    /// Force the .com host regardless of area
    #[arg(long)]
    pub ncr: bool,

    /// Only return results from this recent window
    #[arg(long, value_enum)]
    pub time_period: Option<TimePeriod>,

    /// Keep relevance order instead of sorting results by date
    #[arg(long)]
    pub no_sort_by_date: bool,

    /// Index of the first result page
    #[arg(long)]
    pub first_page: Option<u32>,

    /// Concurrent article downloads
    #[arg(short = 'w', long, env = "NEWS_POOL_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Attempts per HTTP request
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub retry_delay: Option<f64>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "NEWS_POOL_CONFIG")]
    pub config: Option<String>,

    /// Directory for the JSON report; skipped when not given
    #[arg(short, long)]
    pub json_output_dir: Option<String>,
}
