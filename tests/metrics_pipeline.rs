// tests/metrics_pipeline.rs
#![cfg(feature = "strict-metrics")]
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ticker_news_sentiment::ingest::providers::finnhub::FinnhubAdapter;
use ticker_news_sentiment::ingest::providers::yahoo_rss::YahooRssAdapter;
use ticker_news_sentiment::ingest::{FallbackAggregator, SourceAdapter};
use ticker_news_sentiment::prices::YahooChartSource;
use ticker_news_sentiment::sentiment::LexiconScorer;
use ticker_news_sentiment::{telemetry, BatchRunner, CsvPersister, Ticker, TickerPipeline};

#[tokio::test]
async fn metrics_exposed_after_batch() {
    // Installs the global recorder; one test per binary for that reason.
    let handle = telemetry::install_metrics().expect("recorder");

    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(YahooRssAdapter::from_fixture(include_str!("fixtures/yahoo_rss.xml"))),
        Arc::new(FinnhubAdapter::from_fixture(include_str!(
            "fixtures/finnhub_company_news.json"
        ))),
    ];
    let pipeline = TickerPipeline::new(
        Arc::new(YahooChartSource::from_fixture(include_str!("fixtures/yahoo_chart.json"))),
        FallbackAggregator::new(sources),
        Arc::new(LexiconScorer::new()),
    );

    let dir = tempfile::tempdir().unwrap();
    let persister = Arc::new(CsvPersister::new(dir.path()).unwrap());
    let report = BatchRunner::new(Arc::new(pipeline), persister)
        .with_delay(Duration::ZERO)
        .with_run_date(NaiveDate::from_ymd_opt(2024, 5, 7).unwrap())
        .run(&[Ticker::parse("AAPL").unwrap()])
        .await;
    assert!(report.exit_ok());

    let out = handle.render();
    for name in [
        "ingest_source_calls_total",
        "ingest_malformed_items_total",
        "ingest_dedup_total",
        "ingest_fetch_ms",
        "sentiment_scored_total",
        "batch_tickers_total",
        "persist_rows_total",
        "batch_last_run_ts",
    ] {
        assert!(out.contains(name), "missing {name} in:\n{out}");
    }
}
