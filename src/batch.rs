//! # Batch runner
//!
//! Drives the ticker pipeline over a list of symbols. Every ticker gets an outcome;
//! one ticker failing (error or panic) never prevents the others from being processed
//! and persisted. Tickers run on a bounded pool, with a courtesy delay between
//! dispatches. Results are persisted one ticker at a time, in input order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use metrics::{counter, gauge};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::TickerError;
use crate::model::{NewsRecord, Ticker, TickerSummary};
use crate::persist::CsvPersister;
use crate::pipeline::{TickerProcessor, TickerReport};

/// Shared stop signal. Once set, no new tickers are dispatched; in-flight ones finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Succeeded {
        articles: usize,
        persisted_rows: usize,
        bars: usize,
        /// Prices or news failed while the other half went through.
        partial: bool,
    },
    Failed(TickerError),
    /// Never dispatched because the run was cancelled.
    Skipped,
}

impl TickerOutcome {
    fn status(&self) -> &'static str {
        match self {
            TickerOutcome::Succeeded { .. } => "succeeded",
            TickerOutcome::Failed(_) => "failed",
            TickerOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickerResult {
    pub ticker: String,
    pub outcome: TickerOutcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub run_date: Option<NaiveDate>,
    /// One entry per input ticker, input order.
    pub results: Vec<TickerResult>,
    pub records: Vec<NewsRecord>,
    pub summaries: Vec<TickerSummary>,
    /// `(ticker, error)` for every write that failed.
    pub persist_failures: Vec<(String, String)>,
    pub news_rows_persisted: usize,
    pub partition: Option<PathBuf>,
}

impl BatchReport {
    fn count(&self, status: &str) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.status() == status)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count("succeeded")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    /// The run counts as successful only if at least one news row reached disk.
    pub fn exit_ok(&self) -> bool {
        self.news_rows_persisted > 0
    }

    /// Summaries with a mean, highest first; unscored tickers last.
    pub fn ranked_summaries(&self) -> Vec<&TickerSummary> {
        let mut v: Vec<_> = self.summaries.iter().collect();
        v.sort_by(|a, b| match (a.mean_sentiment_score, b.mean_sentiment_score) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        v
    }
}

pub struct BatchRunner {
    processor: Arc<dyn TickerProcessor>,
    persister: Arc<CsvPersister>,
    delay: Duration,
    concurrency: usize,
    cancel: CancelFlag,
    run_date: Option<NaiveDate>,
}

impl BatchRunner {
    pub fn new(processor: Arc<dyn TickerProcessor>, persister: Arc<CsvPersister>) -> Self {
        Self {
            processor,
            persister,
            delay: Duration::from_secs(1),
            concurrency: 1,
            cancel: CancelFlag::new(),
            run_date: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pin the partition date; defaults to today (UTC) at the start of `run`.
    pub fn with_run_date(mut self, date: NaiveDate) -> Self {
        self.run_date = Some(date);
        self
    }

    pub async fn run(&self, tickers: &[Ticker]) -> BatchReport {
        let run_date = self.run_date.unwrap_or_else(|| Utc::now().date_naive());
        info!(
            target: "batch",
            tickers = tickers.len(),
            concurrency = self.concurrency,
            delay_ms = self.delay.as_millis() as u64,
            %run_date,
            "batch started"
        );

        let handles = self.dispatch(tickers).await;

        let mut report = BatchReport {
            run_date: Some(run_date),
            ..Default::default()
        };
        for (ticker, handle) in handles {
            let outcome = match handle {
                None => TickerOutcome::Skipped,
                Some(h) => match h.await {
                    Ok(Ok(r)) => self.persist(r, run_date, &mut report),
                    Ok(Err(e)) => {
                        error!(target: "batch", ticker = %ticker, error = ?e, "ticker failed");
                        TickerOutcome::Failed(TickerError::Pipeline(format!("{e:#}")))
                    }
                    Err(je) if je.is_panic() => {
                        error!(target: "batch", ticker = %ticker, "ticker task panicked");
                        TickerOutcome::Failed(TickerError::Panicked)
                    }
                    Err(je) => {
                        error!(target: "batch", ticker = %ticker, error = %je, "ticker task aborted");
                        TickerOutcome::Failed(TickerError::Pipeline(je.to_string()))
                    }
                },
            };
            counter!("batch_tickers_total", "status" => outcome.status()).increment(1);
            report.results.push(TickerResult { ticker, outcome });
        }

        gauge!("batch_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "batch",
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            rows = report.news_rows_persisted,
            persist_failures = report.persist_failures.len(),
            "batch finished"
        );
        report
    }

    /// Spawns tickers in input order. A permit is taken before the delay, so with a
    /// pool of one the delay separates the end of one ticker from the start of the next.
    async fn dispatch(
        &self,
        tickers: &[Ticker],
    ) -> Vec<(String, Option<JoinHandle<Result<TickerReport>>>)> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tickers.len());

        for (i, t) in tickers.iter().enumerate() {
            let name = t.as_str().to_string();
            if self.cancel.is_cancelled() {
                handles.push((name, None));
                continue;
            }
            let Ok(permit) = sem.clone().acquire_owned().await else {
                handles.push((name, None));
                continue;
            };
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.cancel.is_cancelled() {
                warn!(target: "batch", ticker = %name, "cancelled before dispatch");
                handles.push((name, None));
                continue;
            }

            let processor = self.processor.clone();
            let task_ticker = name.clone();
            let h = tokio::spawn(async move {
                let _permit = permit;
                processor.process(&task_ticker).await
            });
            handles.push((name, Some(h)));
        }
        handles
    }

    /// Writes bars then news rows. Only a failed news write fails the ticker; a failed
    /// bar write marks it partial. Either way the error lands in `persist_failures`.
    fn persist(
        &self,
        r: TickerReport,
        run_date: NaiveDate,
        report: &mut BatchReport,
    ) -> TickerOutcome {
        let mut partial = r.is_partial();
        let mut bars = 0;
        if let Some(b) = r.bars.as_deref().filter(|b| !b.is_empty()) {
            match self.persister.save_stock_bars(&r.ticker, b) {
                Ok(_) => bars = b.len(),
                Err(e) => {
                    self.persist_failed(&r.ticker, &e, report);
                    partial = true;
                }
            }
        }

        report.summaries.push(r.summary);
        match self.persister.append_or_create(&r.records, run_date) {
            Ok(receipt) => {
                report.news_rows_persisted += receipt.rows;
                if receipt.rows > 0 {
                    report.partition = Some(receipt.path);
                }
                let outcome = TickerOutcome::Succeeded {
                    articles: r.records.len(),
                    persisted_rows: receipt.rows,
                    bars,
                    partial,
                };
                report.records.extend(r.records);
                outcome
            }
            Err(e) => {
                self.persist_failed(&r.ticker, &e, report);
                TickerOutcome::Failed(TickerError::Persist(e.to_string()))
            }
        }
    }

    fn persist_failed(&self, ticker: &str, e: &dyn std::error::Error, report: &mut BatchReport) {
        counter!("persist_failures_total").increment(1);
        error!(target: "batch", ticker, error = %e, "persist failed");
        report
            .persist_failures
            .push((ticker.to_string(), e.to_string()));
    }
}
