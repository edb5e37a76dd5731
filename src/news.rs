//! The news driver: search, then pull every result article in parallel.
//!
//! [`News::search`] accumulates result links over `pages` result pages.
//! [`News::get_article_data`] fans those links out through a fire-and-forget
//! [`ThreadHeavy`], one job per link; each job downloads, parses and
//! summarizes its article and pushes it into a collection shared by every
//! job. Articles that cannot be parsed are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::harness::{CallArgs, DispatchReport, Execution, HarnessError, Job, PoolConfig, Retry, ThreadHeavy};
use crate::models::NewsArticle;
use crate::scrapers::search::{SearchOptions, page_range, search_page};
use crate::scrapers::{ScrapeError, article};

/// Parallelism used for article downloads unless configured otherwise.
pub const DEFAULT_ARTICLE_WORKERS: usize = 40;

pub struct News {
    pages: u32,
    lang: String,
    client: Client,
    retry: Retry,
    heavy: ThreadHeavy,
    results: Vec<String>,
    articles: Arc<Mutex<Vec<NewsArticle>>>,
    failed_downloads: Arc<AtomicUsize>,
}

impl News {
    /// `pool` should be fire-and-forget; outcomes of article jobs are not
    /// used, articles arrive through the shared collection.
    pub fn new(
        pages: u32,
        lang: impl Into<String>,
        client: Client,
        retry: Retry,
        pool: PoolConfig,
    ) -> Result<Self, HarnessError> {
        let failed_downloads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failed_downloads);
        let heavy = ThreadHeavy::new(pool)?.with_failure_sink(move |job, error| {
            counter.fetch_add(1, Ordering::Relaxed);
            debug!(job, %error, "Article download failed");
        });
        Ok(Self {
            pages,
            lang: lang.into(),
            client,
            retry,
            heavy,
            results: Vec::new(),
            articles: Arc::new(Mutex::new(Vec::new())),
            failed_downloads,
        })
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Result links gathered so far, in discovery order.
    pub fn results(&self) -> &[String] {
        &self.results
    }

    /// Article downloads that failed across every [`News::get_article_data`]
    /// call so far.
    pub fn failed_downloads(&self) -> usize {
        self.failed_downloads.load(Ordering::Relaxed)
    }

    /// Snapshot of the articles pulled so far.
    pub async fn articles(&self) -> Vec<NewsArticle> {
        self.articles.lock().await.clone()
    }

    /// Search `pages` result pages starting at `opts.first_page` and append
    /// every outbound link to the results. Returns the number of links added.
    #[instrument(level = "info", skip(self, opts))]
    pub async fn search(&mut self, query: &str, opts: &SearchOptions) -> Result<usize, ScrapeError> {
        let before = self.results.len();
        for page in page_range(opts.first_page, self.pages) {
            let links = search_page(&self.client, &self.retry, query, page, &self.lang, opts).await?;
            self.results.extend(links);
        }
        let added = self.results.len() - before;
        info!(added, total = self.results.len(), "Search complete");
        Ok(added)
    }

    /// Pull every result article concurrently.
    ///
    /// Returns once every job has finished. The report counts jobs and
    /// download failures; unparseable pages are not failures.
    #[instrument(level = "info", skip(self), fields(results = self.results.len()))]
    pub async fn get_article_data(&self) -> Result<DispatchReport, HarnessError> {
        let client = self.client.clone();
        let retry = self.retry.clone();
        let articles = Arc::clone(&self.articles);

        let exec = self
            .heavy
            .call_async(
                move |job: Job<String>| {
                    let client = client.clone();
                    let retry = retry.clone();
                    let articles = Arc::clone(&articles);
                    async move { pull_info(&client, &retry, &articles, job).await }
                },
                CallArgs::new().arg_seq(self.results.iter().cloned()),
            )
            .await?;

        let report = match exec {
            Execution::Acknowledged(report) => report,
            Execution::Collected(outcomes) => DispatchReport {
                submitted: outcomes.len(),
                failed: outcomes.iter().filter(|o| !o.is_ok()).count(),
            },
        };
        info!(
            submitted = report.submitted,
            failed = report.failed,
            articles = self.articles.lock().await.len(),
            "Article pull complete"
        );
        Ok(report)
    }
}

/// One article job: the link is the job's only argument.
async fn pull_info(
    client: &Client,
    retry: &Retry,
    articles: &Mutex<Vec<NewsArticle>>,
    job: Job<String>,
) -> Result<(), ScrapeError> {
    let Some(url) = job.arg(0) else {
        return Ok(());
    };
    match article::pull_article(client, retry, url).await {
        Ok(article) => {
            articles.lock().await.push(article);
            Ok(())
        }
        Err(ScrapeError::Parse { url, reason }) => {
            debug!(%url, %reason, "Could not parse article; skipping");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
