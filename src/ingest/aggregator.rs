//! # Fallback aggregator
//!
//! Walks the configured adapters in priority order and collects up to
//! `max_articles` deduplicated records for one ticker.
//!
//! - Every adapter call runs in its own task under a timeout, so an `Err`, a panic
//!   or a hung provider is contained at the call boundary and never reaches the caller.
//! - `Unauthenticated` disables the adapter for the lifetime of the aggregator (one run).
//! - The stop rule is an explicit [`FallbackPolicy`].
//! - Dedup runs on the whole accumulator, then the result is truncated to the cap,
//!   so earlier adapters win ties.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SourceFault;
use crate::ingest::dedup::dedupe_counted;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::{SourceAdapter, SourceBatch};
use crate::model::NewsRecord;

/// When to stop asking further adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Stop once the raw accumulator holds at least `max_articles` records.
    #[default]
    UntilCap,
    /// Stop after the first adapter that returns anything (or at the cap).
    FirstNonEmpty,
    /// Call every adapter; only dedup + truncation bound the result.
    Exhaustive,
}

impl FallbackPolicy {
    fn should_stop(self, accumulated: usize, max_articles: usize, added: usize) -> bool {
        match self {
            FallbackPolicy::UntilCap => accumulated >= max_articles,
            FallbackPolicy::FirstNonEmpty => added > 0 || accumulated >= max_articles,
            FallbackPolicy::Exhaustive => false,
        }
    }
}

struct Slot {
    adapter: Arc<dyn SourceAdapter>,
    disabled: AtomicBool,
}

/// Result of one `collect` call, with per-source bookkeeping for the report.
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub records: Vec<NewsRecord>,
    /// Calls that returned a valid (possibly empty) batch.
    pub sources_ok: usize,
    /// Calls that faulted (credential, network, bug, panic, timeout).
    pub sources_failed: usize,
    /// Adapters not called because an earlier call disabled them.
    pub sources_skipped: usize,
    pub duplicates: usize,
}

impl AggregateOutcome {
    /// True when sources were involved but none of them answered successfully.
    pub fn all_sources_failed(&self) -> bool {
        self.sources_ok == 0 && self.sources_failed + self.sources_skipped > 0
    }
}

pub struct FallbackAggregator {
    slots: Vec<Slot>,
    policy: FallbackPolicy,
    call_timeout: Duration,
}

impl FallbackAggregator {
    /// `adapters` must already be in priority order (most reliable first).
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let slots = adapters
            .into_iter()
            .map(|adapter| Slot {
                adapter,
                disabled: AtomicBool::new(false),
            })
            .collect();
        Self {
            slots,
            policy: FallbackPolicy::default(),
            call_timeout: Duration::from_secs(12),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.adapter.name()).collect()
    }

    pub async fn collect(&self, ticker: &str, max_articles: usize) -> AggregateOutcome {
        ensure_metrics_described();

        let mut out = AggregateOutcome::default();
        if max_articles == 0 {
            return out;
        }

        let mut acc: Vec<NewsRecord> = Vec::new();
        for slot in &self.slots {
            let name = slot.adapter.name();
            if slot.disabled.load(Ordering::Relaxed) {
                debug!(target: "ingest", source = name, ticker, "source disabled for this run, skipping");
                out.sources_skipped += 1;
                continue;
            }

            counter!("ingest_source_calls_total", "source" => name).increment(1);
            let t0 = Instant::now();
            let result = self.call(slot, ticker, max_articles).await;
            histogram!("ingest_fetch_ms", "source" => name)
                .record(t0.elapsed().as_secs_f64() * 1_000.0);

            let mut added = 0usize;
            match result {
                Ok(batch) => {
                    if batch.malformed > 0 {
                        counter!("ingest_malformed_items_total", "source" => name)
                            .increment(batch.malformed as u64);
                        debug!(target: "ingest", source = name, ticker, dropped = batch.malformed, "malformed items dropped");
                    }
                    match batch.fault {
                        None => {
                            out.sources_ok += 1;
                            added = batch.records.len();
                            if added == 0 {
                                debug!(target: "ingest", source = name, ticker, "source returned no items");
                            }
                            acc.extend(batch.records);
                        }
                        Some(SourceFault::Unauthenticated) => {
                            out.sources_failed += 1;
                            counter!("ingest_source_errors_total", "source" => name, "kind" => "unauthenticated").increment(1);
                            if !slot.disabled.swap(true, Ordering::Relaxed) {
                                warn!(target: "ingest", source = name, "credential missing or rejected, source disabled for this run");
                            }
                        }
                        Some(SourceFault::Unavailable(reason)) => {
                            out.sources_failed += 1;
                            counter!("ingest_source_errors_total", "source" => name, "kind" => "unavailable").increment(1);
                            warn!(target: "ingest", source = name, ticker, %reason, "source unavailable");
                        }
                    }
                }
                Err(e) => {
                    out.sources_failed += 1;
                    counter!("ingest_source_errors_total", "source" => name, "kind" => "fault").increment(1);
                    warn!(target: "ingest", source = name, ticker, error = ?e, "source fault contained");
                }
            }

            if self.policy.should_stop(acc.len(), max_articles, added) {
                break;
            }
        }

        let (mut records, duplicates) = dedupe_counted(acc);
        records.truncate(max_articles);
        counter!("ingest_dedup_total").increment(duplicates as u64);

        out.records = records;
        out.duplicates = duplicates;
        out
    }

    async fn call(&self, slot: &Slot, ticker: &str, max_articles: usize) -> anyhow::Result<SourceBatch> {
        let adapter = Arc::clone(&slot.adapter);
        let ticker = ticker.to_string();
        let mut handle = tokio::spawn(async move { adapter.fetch(&ticker, max_articles).await });

        match tokio::time::timeout(self.call_timeout, &mut handle).await {
            Ok(Ok(res)) => res,
            Ok(Err(join)) if join.is_panic() => Err(anyhow!("adapter panicked")),
            Ok(Err(join)) => Err(anyhow!("adapter task cancelled: {join}")),
            Err(_) => {
                handle.abort();
                Ok(SourceBatch::failed(SourceFault::Unavailable(format!(
                    "timed out after {}ms",
                    self.call_timeout.as_millis()
                ))))
            }
        }
    }
}
