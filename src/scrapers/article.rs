//! Article download and parsing.
//!
//! Pages are read the way most news sites mark them up:
//!
//! | Field | Looked up in |
//! |-------|--------------|
//! | title | `og:title`, then `<title>` |
//! | authors | `meta[name=author]`, then `[rel=author]` links |
//! | publish date | `article:published_time`, then `<time datetime>` |
//! | description | `og:description`, then `meta[name=description]` |
//! | text | `<article> p`, then every `<p>` |
//!
//! A page without body text cannot be parsed.

use chrono::{DateTime, FixedOffset, NaiveDate};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::{ScrapeError, get_html_with_retry};
use crate::harness::Retry;
use crate::models::{NewsArticle, ParsedArticle};
use crate::summarize::{lead, summarize_or};
use crate::utils::truncate_for_log;

/// Sentences used for the built-in summary when a page has no description.
const LEAD_SENTENCES: usize = 3;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META_AUTHOR: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="author"]"#));
static REL_AUTHOR: Lazy<Selector> = Lazy::new(|| selector(r#"[rel="author"]"#));
static PUBLISHED: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="article:published_time"]"#));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static ARTICLE_PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("article p"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().join(" ")
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (read as UTC
/// midnight).
fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
    })
}

fn source_url(url: &Url) -> String {
    match url.host_str() {
        Some(host) => format!("{}://{}", url.scheme(), host),
        None => url.as_str().to_string(),
    }
}

fn authors(document: &Html) -> Vec<String> {
    let from_meta = document
        .select(&META_AUTHOR)
        .filter_map(|m| m.value().attr("content"))
        .flat_map(|c| c.split(','))
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unique()
        .collect::<Vec<_>>();
    if !from_meta.is_empty() {
        return from_meta;
    }
    document
        .select(&REL_AUTHOR)
        .map(element_text)
        .filter(|a| !a.is_empty())
        .unique()
        .collect()
}

fn body_text(document: &Html) -> String {
    let paragraphs = |selector: &Selector| {
        document
            .select(selector)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
    };
    let mut found = paragraphs(&ARTICLE_PARAGRAPH);
    if found.is_empty() {
        found = paragraphs(&PARAGRAPH);
    }
    found.join("\n")
}

/// Parse a downloaded article page.
pub fn parse_article(url: &str, html: &str) -> Result<ParsedArticle, ScrapeError> {
    let parsed_url = Url::parse(url)?;
    let document = Html::parse_document(html);

    let text = body_text(&document);
    if text.is_empty() {
        return Err(ScrapeError::Parse {
            url: url.to_string(),
            reason: "no article text found".to_string(),
        });
    }

    let title = meta_content(&document, &OG_TITLE)
        .or_else(|| first_text(&document, &TITLE))
        .unwrap_or_default();
    let publish_date = meta_content(&document, &PUBLISHED)
        .or_else(|| {
            document
                .select(&TIME)
                .filter_map(|t| t.value().attr("datetime"))
                .map(str::to_string)
                .next()
        })
        .and_then(|raw| parse_date(&raw));
    let description = meta_content(&document, &OG_DESCRIPTION)
        .or_else(|| meta_content(&document, &DESCRIPTION));

    debug!(title = %truncate_for_log(&title, 80), bytes = text.len(), "Parsed article");
    Ok(ParsedArticle {
        url: url.to_string(),
        source_url: source_url(&parsed_url),
        title,
        authors: authors(&document),
        publish_date,
        text,
        description,
    })
}

/// Summarize a parsed article, falling back to its built-in summary.
pub fn finish_article(parsed: ParsedArticle) -> NewsArticle {
    let ParsedArticle {
        url,
        source_url,
        title,
        authors,
        publish_date,
        text,
        description,
    } = parsed;
    let summary = summarize_or(&text, || {
        description.unwrap_or_else(|| lead(&text, LEAD_SENTENCES))
    });
    NewsArticle {
        url,
        source_url,
        title,
        authors,
        publish_date,
        summary,
    }
}

/// Download, parse and summarize one article.
#[instrument(level = "info", skip(client, retry))]
pub async fn pull_article(
    client: &Client,
    retry: &Retry,
    url: &str,
) -> Result<NewsArticle, ScrapeError> {
    let html = get_html_with_retry(client, retry, url).await?;
    let article = finish_article(parse_article(url, &html)?);
    info!(title = %truncate_for_log(&article.title, 80), "Pulled article");
    Ok(article)
}
