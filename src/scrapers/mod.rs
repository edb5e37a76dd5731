//! Search and article scrapers.
//!
//! Scraping is split in two phases, mirroring how [`News`](crate::news::News)
//! drives them:
//!
//! 1. **Search**: [`search`] builds news-search URLs and pulls outbound
//!    result links from each result page.
//! 2. **Articles**: [`article`] downloads one result link and parses title,
//!    authors, publish date and body text from it.
//!
//! Both go through [`get_html`] wrapped in a [`Retry`], so transient HTTP
//! failures are retried before they surface.

pub mod article;
pub mod search;

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::harness::{Retry, RetryExhausted};

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not parse article at {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error(transparent)]
    Retry(Box<RetryExhausted<ScrapeError>>),
}

impl From<RetryExhausted<ScrapeError>> for ScrapeError {
    fn from(e: RetryExhausted<ScrapeError>) -> Self {
        ScrapeError::Retry(Box::new(e))
    }
}

/// Build the shared HTTP client.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<Client, ScrapeError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

/// GET a page and return its body; non-2xx statuses are errors.
#[instrument(level = "debug", skip(client))]
pub async fn get_html(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!(bytes = body.len(), "Downloaded page");
    Ok(body)
}

/// [`get_html`] under the given retry policy.
pub async fn get_html_with_retry(
    client: &Client,
    retry: &Retry,
    url: &str,
) -> Result<String, ScrapeError> {
    Ok(retry.call_async(|| get_html(client, url)).await?)
}
