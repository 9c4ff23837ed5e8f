// tests/ingest_fallback.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ticker_news_sentiment::error::SourceFault;
use ticker_news_sentiment::ingest::providers::finnhub::FinnhubAdapter;
use ticker_news_sentiment::ingest::providers::yahoo_rss::YahooRssAdapter;
use ticker_news_sentiment::ingest::{FallbackAggregator, FallbackPolicy, SourceAdapter, SourceBatch};
use ticker_news_sentiment::model::NewsRecord;

struct Titles {
    name: &'static str,
    source: &'static str,
    titles: Vec<&'static str>,
    calls: AtomicUsize,
}

impl Titles {
    fn new(name: &'static str, source: &'static str, titles: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            source,
            titles: titles.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for Titles {
    async fn fetch(&self, ticker: &str, max: usize) -> Result<SourceBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let records = self
            .titles
            .iter()
            .take(max)
            .map(|t| NewsRecord::new(ticker, *t, self.source))
            .collect();
        Ok(SourceBatch::ok(records, 0))
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

struct Panics;

#[async_trait]
impl SourceAdapter for Panics {
    async fn fetch(&self, _ticker: &str, _max: usize) -> Result<SourceBatch> {
        panic!("index out of bounds in provider mapping");
    }
    fn name(&self) -> &'static str {
        "panics"
    }
}

struct Down;

#[async_trait]
impl SourceAdapter for Down {
    async fn fetch(&self, _ticker: &str, _max: usize) -> Result<SourceBatch> {
        Ok(SourceBatch::failed(SourceFault::Unavailable("http status 503".into())))
    }
    fn name(&self) -> &'static str {
        "down"
    }
}

fn titles(records: &[NewsRecord]) -> Vec<(&str, &str)> {
    records
        .iter()
        .map(|r| (r.title.as_str(), r.source.as_str()))
        .collect()
}

#[tokio::test]
async fn earlier_source_wins_duplicates() {
    let a = Titles::new("a", "A", &["Apple beats"]);
    let b = Titles::new("b", "B", &["apple beats ", "Apple misses"]);
    let agg = FallbackAggregator::new(vec![a as Arc<dyn SourceAdapter>, b]);

    let out = agg.collect("AAPL", 5).await;
    assert_eq!(
        titles(&out.records),
        vec![("Apple beats", "A"), ("Apple misses", "B")]
    );
    assert_eq!(out.duplicates, 1);
    assert_eq!(out.sources_ok, 2);
}

#[tokio::test]
async fn cap_stops_fallback_and_truncates() {
    let a = Titles::new("a", "A", &["one", "two", "three"]);
    let b = Titles::new("b", "B", &["four"]);
    let agg = FallbackAggregator::new(vec![a.clone() as Arc<dyn SourceAdapter>, b.clone()]);

    let out = agg.collect("AAPL", 2).await;
    assert_eq!(out.records.len(), 2);
    assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_source_is_contained() {
    let a = Titles::new("a", "A", &["Apple beats"]);
    let c = Titles::new("c", "C", &["Apple misses"]);
    let agg = FallbackAggregator::new(vec![a as Arc<dyn SourceAdapter>, Arc::new(Panics), c]);

    let out = agg.collect("AAPL", 5).await;
    assert_eq!(
        titles(&out.records),
        vec![("Apple beats", "A"), ("Apple misses", "C")]
    );
    assert_eq!(out.sources_failed, 1);
    assert!(!out.all_sources_failed());
}

#[tokio::test]
async fn every_source_down_is_distinguishable_from_no_news() {
    let agg = FallbackAggregator::new(vec![Arc::new(Down) as Arc<dyn SourceAdapter>, Arc::new(Panics)]);
    let out = agg.collect("AAPL", 5).await;
    assert!(out.records.is_empty());
    assert!(out.all_sources_failed());

    let quiet = FallbackAggregator::new(vec![Titles::new("a", "A", &[]) as Arc<dyn SourceAdapter>]);
    let out = quiet.collect("AAPL", 5).await;
    assert!(out.records.is_empty());
    assert!(!out.all_sources_failed());
}

#[tokio::test]
async fn first_non_empty_stops_below_cap() {
    let a = Titles::new("a", "A", &[]);
    let b = Titles::new("b", "B", &["only one"]);
    let c = Titles::new("c", "C", &["never asked"]);
    let agg = FallbackAggregator::new(vec![a as Arc<dyn SourceAdapter>, b, c.clone()])
        .with_policy(FallbackPolicy::FirstNonEmpty);

    let out = agg.collect("AAPL", 5).await;
    assert_eq!(titles(&out.records), vec![("only one", "B")]);
    assert_eq!(c.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fixtures_merge_across_real_providers() {
    let yahoo = Arc::new(YahooRssAdapter::from_fixture(include_str!(
        "fixtures/yahoo_rss.xml"
    )));
    let finnhub = Arc::new(FinnhubAdapter::from_fixture(include_str!(
        "fixtures/finnhub_company_news.json"
    )));
    let agg = FallbackAggregator::new(vec![yahoo as Arc<dyn SourceAdapter>, finnhub]);

    let out = agg.collect("AAPL", 10).await;
    // finnhub repeats yahoo's earnings headline in upper case
    assert_eq!(out.duplicates, 1);
    assert_eq!(out.records.len(), 4);
    assert_eq!(out.records[0].source, "Yahoo Finance");
    assert!(out
        .records
        .iter()
        .any(|r| r.source == "Finnhub" && r.title.contains("buyback")));
}
