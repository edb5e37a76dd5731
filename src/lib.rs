//! # news_pool
//!
//! Searches news for a query and pulls every result article in parallel,
//! built on a small concurrency harness.
//!
//! ## Architecture
//!
//! 1. **Harness** ([`harness`]): bounded retry with a fixed delay, and
//!    [`ThreadHeavy`](harness::ThreadHeavy), which splits one call into one
//!    job per element of its vector arguments and runs the jobs on a bounded
//!    worker pool
//! 2. **Search** ([`scrapers::search`]): result-page URLs and outbound links
//! 3. **Articles** ([`scrapers::article`], [`summarize`]): download, parse,
//!    summarize
//! 4. **Driver** ([`news`]): ties search and article pulls together
//! 5. **Output** ([`outputs`]): JSON report

pub mod cli;
pub mod config;
pub mod harness;
pub mod models;
pub mod news;
pub mod outputs;
pub mod scrapers;
pub mod summarize;
pub mod utils;
