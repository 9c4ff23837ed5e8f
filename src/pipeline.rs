//! # Ticker pipeline
//! One ticker end to end: price bars and news are fetched concurrently, news is scored,
//! and a summary is derived. A failing sub-fetch is marked in the report and never
//! blocks the other one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::ingest::FallbackAggregator;
use crate::model::{NewsRecord, StockBar, TickerSummary};
use crate::prices::PriceSource;
use crate::sentiment::{score_all, DynScorer};

/// Which half of a ticker run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubFetch {
    Prices,
    News,
}

#[derive(Debug, Clone)]
pub struct TickerReport {
    pub ticker: String,
    /// `None` when the price fetch failed (as opposed to an empty series).
    pub bars: Option<Vec<StockBar>>,
    /// Deduplicated, scored records.
    pub records: Vec<NewsRecord>,
    pub summary: TickerSummary,
    pub failed: Vec<SubFetch>,
    pub duplicates: usize,
}

impl TickerReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Unit of work the batch runner drives.
#[async_trait]
pub trait TickerProcessor: Send + Sync {
    async fn process(&self, ticker: &str) -> Result<TickerReport>;
}

pub struct TickerPipeline {
    prices: Arc<dyn PriceSource>,
    news: FallbackAggregator,
    scorer: DynScorer,
    max_articles: usize,
    lookback_days: u32,
    price_timeout: Duration,
}

impl TickerPipeline {
    pub fn new(prices: Arc<dyn PriceSource>, news: FallbackAggregator, scorer: DynScorer) -> Self {
        Self {
            prices,
            news,
            scorer,
            max_articles: 5,
            lookback_days: 30,
            price_timeout: Duration::from_secs(12),
        }
    }

    pub fn with_max_articles(mut self, n: usize) -> Self {
        self.max_articles = n;
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_price_timeout(mut self, timeout: Duration) -> Self {
        self.price_timeout = timeout;
        self
    }

    async fn fetch_bars(&self, ticker: &str) -> Option<Vec<StockBar>> {
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(self.lookback_days));
        let call = self.prices.get_prices(ticker, start, end);
        match tokio::time::timeout(self.price_timeout, call).await {
            Ok(Ok(bars)) => Some(bars),
            Ok(Err(e)) => {
                warn!(ticker, source = self.prices.name(), error = ?e, "price fetch failed");
                None
            }
            Err(_) => {
                warn!(ticker, source = self.prices.name(), "price fetch timed out");
                None
            }
        }
    }

    pub async fn run(&self, ticker: &str) -> TickerReport {
        let (bars, news) = tokio::join!(
            self.fetch_bars(ticker),
            self.news.collect(ticker, self.max_articles)
        );

        let mut failed = Vec::new();
        if bars.is_none() {
            failed.push(SubFetch::Prices);
        }
        if news.all_sources_failed() {
            failed.push(SubFetch::News);
        }

        let records = score_all(self.scorer.as_ref(), news.records).await;
        let summary = TickerSummary::from_records(ticker, &records);

        info!(
            ticker,
            bars = bars.as_ref().map_or(0, Vec::len),
            articles = records.len(),
            duplicates = news.duplicates,
            mean = ?summary.mean_sentiment_score,
            partial = !failed.is_empty(),
            "ticker processed"
        );

        TickerReport {
            ticker: ticker.to_string(),
            bars,
            records,
            summary,
            failed,
            duplicates: news.duplicates,
        }
    }
}

#[async_trait]
impl TickerProcessor for TickerPipeline {
    async fn process(&self, ticker: &str) -> Result<TickerReport> {
        Ok(self.run(ticker).await)
    }
}
