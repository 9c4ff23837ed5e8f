//! Batch entrypoint.
//!
//! `ticker-news-sentiment [TICKER ...]` runs the pipeline once over the given symbols
//! (or the configured list), appends today's news partition and exits. The exit code
//! is success only if at least one news row was persisted.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use ticker_news_sentiment::config::{resolve_tickers, Credentials, PipelineConfig};
use ticker_news_sentiment::ingest::providers::{build_sources, http::build_client};
use ticker_news_sentiment::ingest::FallbackAggregator;
use ticker_news_sentiment::prices::YahooChartSource;
use ticker_news_sentiment::sentiment::build_scorer;
use ticker_news_sentiment::{telemetry, BatchReport, BatchRunner, CancelFlag, CsvPersister, TickerPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    match run().await {
        Ok(report) if report.exit_ok() => ExitCode::SUCCESS,
        Ok(_) => {
            warn!("no news rows were persisted");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = ?e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<BatchReport> {
    let metrics = telemetry::install_metrics()?;

    let cfg = PipelineConfig::load_default()?;
    let creds = Credentials::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let tickers = resolve_tickers(&args, &cfg)?;
    info!(?creds, tickers = ?tickers.iter().map(|t| t.as_str()).collect::<Vec<_>>(), "starting run");

    let persister = Arc::new(CsvPersister::new(&cfg.output_dir)?);
    let client = build_client(cfg.http_timeout())?;

    let news = FallbackAggregator::new(build_sources(&cfg.sources, &creds, &client))
        .with_policy(cfg.fallback_policy)
        .with_call_timeout(cfg.http_timeout() + Duration::from_secs(2));
    if news.source_names().is_empty() {
        warn!("no news sources configured; only price data will be collected");
    }

    let pipeline = TickerPipeline::new(
        Arc::new(YahooChartSource::new(client.clone())),
        news,
        build_scorer(&cfg, &creds, client),
    )
    .with_max_articles(cfg.max_articles)
    .with_lookback_days(cfg.lookback_days)
    .with_price_timeout(cfg.http_timeout() + Duration::from_secs(2));

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight tickers");
                cancel.cancel();
            }
        });
    }

    let report = BatchRunner::new(Arc::new(pipeline), persister)
        .with_delay(cfg.request_delay())
        .with_concurrency(cfg.concurrency)
        .with_cancel(cancel)
        .run(&tickers)
        .await;

    for s in report.ranked_summaries() {
        info!(
            ticker = %s.ticker,
            mean = ?s.mean_sentiment_score,
            articles = s.article_count,
            positive = s.positive,
            neutral = s.neutral,
            negative = s.negative,
            "summary"
        );
    }
    if let Some(p) = &report.partition {
        info!(path = %p.display(), rows = report.news_rows_persisted, "news saved");
    }

    match telemetry::dump_metrics(&metrics) {
        Ok(Some(p)) => info!(path = %p.display(), "metrics written"),
        Ok(None) => {}
        Err(e) => warn!(error = ?e, "metrics dump failed"),
    }

    Ok(report)
}
