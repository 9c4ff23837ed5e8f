// src/sentiment/mod.rs
//! Sentiment scoring behind one strategy trait. The implementation is picked once
//! when the pipeline is built, never per call.

pub mod cache;
pub mod finbert_api;
pub mod lexicon;

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Credentials, PipelineConfig};
use crate::model::{NewsRecord, SentimentScore};

pub use cache::CachingScorer;
pub use finbert_api::FinbertApiScorer;
pub use lexicon::LexiconScorer;

#[async_trait::async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentScore>;
    fn name(&self) -> &'static str;
}

pub type DynScorer = Arc<dyn SentimentScorer>;

/// Which scorer the run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    Lexicon,
    FinbertApi,
}

/// Build the configured scorer. A remote scorer without a token falls back to the lexicon.
pub fn build_scorer(
    cfg: &PipelineConfig,
    creds: &Credentials,
    http: reqwest::Client,
) -> DynScorer {
    match cfg.scorer {
        ScorerKind::Lexicon => Arc::new(LexiconScorer::new()),
        ScorerKind::FinbertApi => match creds.hf_api_token.clone() {
            Some(token) => {
                info!(key_len = token.len(), "using remote finbert scorer");
                let remote = FinbertApiScorer::new(http, token);
                Arc::new(CachingScorer::new(
                    remote,
                    cfg.scorer_cache_dir.clone(),
                    cfg.scorer_daily_limit,
                ))
            }
            None => {
                warn!("HF_API_TOKEN not set, falling back to lexicon scorer");
                Arc::new(LexiconScorer::new())
            }
        },
    }
}

/// Attach a score to one record. Blank titles get the neutral placeholder and
/// never reach the scorer. A scorer error leaves the record unscored.
pub async fn score_record(scorer: &dyn SentimentScorer, mut rec: NewsRecord) -> NewsRecord {
    if rec.title.trim().is_empty() {
        rec.score = Some(SentimentScore::neutral_placeholder());
        counter!("sentiment_scored_total", "outcome" => "placeholder").increment(1);
        return rec;
    }

    match scorer.score(&rec.title).await {
        Ok(s) => {
            rec.score = Some(s);
            counter!("sentiment_scored_total", "outcome" => "scored").increment(1);
        }
        Err(e) => {
            counter!("sentiment_scored_total", "outcome" => "failed").increment(1);
            warn!(ticker = %rec.ticker, scorer = scorer.name(), error = ?e, "scoring failed, record left unscored");
        }
    }
    rec
}

/// Scores records one by one, keeping order.
pub async fn score_all(scorer: &dyn SentimentScorer, records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        out.push(score_record(scorer, rec).await);
    }
    out
}
