//! News search: result-page URLs and link extraction.
//!
//! # URL Pattern
//!
//! ```text
//! https://www.google.{area}/search?nl={lang}&q={query}&start={page*10}&num=10&tbs={tbs}&tbm=nws
//! ```
//!
//! `tbs` combines an optional time window (`qdr:h`, `qdr:d`, ...) with
//! `sbd:1` when results are sorted by date. `ncr` ("no country redirect")
//! pins the host to `google.com`.

use std::ops::Range;

use clap::ValueEnum;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{ScrapeError, get_html_with_retry};
use crate::harness::Retry;

pub const RESULTS_PER_PAGE: u32 = 10;

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div#rso a[href]").expect("result link selector"));

/// Restrict results to a recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimePeriod {
    fn code(self) -> &'static str {
        match self {
            TimePeriod::Hour => "qdr:h",
            TimePeriod::Day => "qdr:d",
            TimePeriod::Week => "qdr:w",
            TimePeriod::Month => "qdr:m",
            TimePeriod::Year => "qdr:y",
        }
    }
}

/// Per-search knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Top-level domain of the search host (`com`, `co.uk`, ...).
    pub area: String,
    pub ncr: bool,
    pub time_period: Option<TimePeriod>,
    pub sort_by_date: bool,
    /// Index of the first result page to fetch.
    pub first_page: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            area: "com".to_string(),
            ncr: false,
            time_period: None,
            sort_by_date: true,
            first_page: 0,
        }
    }
}

/// Web search URL for one result page.
pub fn search_url(query: &str, page: u32, lang: &str, opts: &SearchOptions) -> String {
    let tbs = opts
        .time_period
        .map(TimePeriod::code)
        .into_iter()
        .chain(opts.sort_by_date.then_some("sbd:1"))
        .join(",");
    let host = if opts.ncr { "com" } else { opts.area.as_str() };

    format!(
        "https://www.google.{host}/search?nl={}&q={}&start={}&num={RESULTS_PER_PAGE}&tbs={}",
        urlencoding::encode(lang),
        urlencoding::encode(query),
        u64::from(page) * u64::from(RESULTS_PER_PAGE),
        urlencoding::encode(&tbs),
    )
}

/// Result pages to fetch: `pages` pages from `first_page`, clamped at the
/// last representable page number.
pub fn page_range(first_page: u32, pages: u32) -> Range<u32> {
    first_page..first_page.saturating_add(pages)
}

/// [`search_url`] restricted to the news vertical.
pub fn news_search_url(query: &str, page: u32, lang: &str, opts: &SearchOptions) -> String {
    format!("{}&tbm=nws", search_url(query, page, lang, opts))
}

/// Outbound result links of a result page, first occurrence order.
///
/// Links starting with `/` point back into the search engine and are
/// dropped.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty() && !href.starts_with('/'))
        .map(str::to_string)
        .unique()
        .collect()
}

/// Fetch one news result page and extract its links.
#[instrument(level = "info", skip(client, retry, opts))]
pub async fn search_page(
    client: &Client,
    retry: &Retry,
    query: &str,
    page: u32,
    lang: &str,
    opts: &SearchOptions,
) -> Result<Vec<String>, ScrapeError> {
    let url = news_search_url(query, page, lang, opts);
    info!(%url, "Search URL");
    let html = get_html_with_retry(client, retry, &url).await?;
    let links = extract_links(&html);
    debug!(count = links.len(), links = ?links, "Extracted result links");
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"
        <html><body>
          <a href="https://outside.example.com/ignored">not in results</a>
          <div id="rso">
            <div><a href="https://news.example.com/story-1">Story 1</a></div>
            <div><a href="/search?q=more">More</a></div>
            <div><a href="https://news.example.com/story-1">Story 1 again</a></div>
            <g-card><a href="https://other.example.org/story-2">Story 2</a></g-card>
            <a href="">empty</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_search_url_defaults() {
        let url = news_search_url("Donald Trump", 1, "en", &SearchOptions::default());
        assert_eq!(
            url,
            "https://www.google.com/search?nl=en&q=Donald%20Trump&start=10&num=10&tbs=sbd%3A1&tbm=nws"
        );
    }

    #[test]
    fn test_search_url_area_time_and_ncr() {
        let mut opts = SearchOptions {
            area: "co.uk".to_string(),
            time_period: Some(TimePeriod::Week),
            sort_by_date: false,
            ..SearchOptions::default()
        };
        let url = search_url("rust", 0, "en", &opts);
        assert!(url.starts_with("https://www.google.co.uk/search?"));
        assert!(url.ends_with("&tbs=qdr%3Aw"));

        opts.ncr = true;
        opts.sort_by_date = true;
        let url = search_url("rust", 0, "en", &opts);
        assert!(url.starts_with("https://www.google.com/search?"));
        assert!(url.ends_with("&tbs=qdr%3Aw%2Csbd%3A1"));
    }

    #[test]
    fn test_far_pages_do_not_overflow() {
        let url = search_url("rust", u32::MAX, "en", &SearchOptions::default());
        assert!(url.contains("&start=42949672950&"));

        assert_eq!(page_range(3, 2), 3..5);
        assert_eq!(page_range(u32::MAX - 1, 5), u32::MAX - 1..u32::MAX);
        assert!(page_range(u32::MAX, 1).is_empty());
    }

    #[test]
    fn test_extract_links_filters_and_dedupes() {
        assert_eq!(
            extract_links(RESULTS_HTML),
            vec![
                "https://news.example.com/story-1".to_string(),
                "https://other.example.org/story-2".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_without_results_block() {
        assert!(extract_links("<html><body><a href='https://x.y'>x</a></body></html>").is_empty());
    }
}
