//! Data models for scraped news articles.
//!
//! - [`ParsedArticle`]: what the article parser extracts from a page
//! - [`NewsArticle`]: a parsed article with its summary, as kept by [`News`](crate::news::News)
//! - [`SearchReport`]: one run of the tool, as written to JSON

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Fields pulled out of an article page before summarization.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArticle {
    /// The URL the page was downloaded from.
    pub url: String,
    /// Scheme and host of `url`, e.g. `https://www.example.com`.
    pub source_url: String,
    pub title: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<FixedOffset>>,
    /// Body text, one paragraph per line.
    pub text: String,
    /// The page's own short description, used as the built-in summary.
    pub description: Option<String>,
}

/// A fully processed article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub url: String,
    pub source_url: String,
    pub title: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<FixedOffset>>,
    pub summary: String,
}

/// Output of one search-and-scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub query: String,
    /// `YYYY-MM-DD`, local time.
    pub local_date: String,
    pub local_time: String,
    /// Number of result links the search produced.
    pub result_count: usize,
    pub articles: Vec<NewsArticle>,
}
