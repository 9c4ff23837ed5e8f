//! # Data model
//! Plain records shared by every pipeline stage: news items, price bars and the
//! per-ticker summary. No I/O lives here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Validated market symbol: ASCII uppercase letters, 1..=5 chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    /// Uppercases and validates a raw symbol (`" aapl "` → `AAPL`).
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let sym = raw.trim().to_ascii_uppercase();
        let ok = (1..=5).contains(&sym.len()) && sym.chars().all(|c| c.is_ascii_uppercase());
        if ok {
            Ok(Self(sym))
        } else {
            Err(ConfigError::InvalidTicker(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sentiment label attached by a scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// The scorer's triple. Kept as one value so the three fields are attached atomically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    /// In [0, 1].
    pub confidence: f64,
    /// In [-1, 1].
    pub sentiment_score: f64,
}

impl SentimentScore {
    /// Builds a triple, clamping both scalars into their ranges.
    pub fn new(sentiment: Sentiment, confidence: f64, sentiment_score: f64) -> Self {
        Self {
            sentiment,
            confidence: clamp_finite(confidence, 0.0, 1.0),
            sentiment_score: clamp_finite(sentiment_score, -1.0, 1.0),
        }
    }

    /// Substitute used for blank titles; never produced by a scorer call.
    pub fn neutral_placeholder() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            confidence: 0.0,
            sentiment_score: 0.0,
        }
    }
}

fn clamp_finite(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_finite() {
        x.clamp(lo, hi)
    } else {
        0.0
    }
}

/// Publication time as reported by the provider. Scraped feeds sometimes carry
/// free text ("2 hours ago") that we keep verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    At(DateTime<Utc>),
    Raw(String),
}

impl Published {
    /// Parses RFC 3339 when possible, otherwise keeps the text. Blank → `None`.
    pub fn from_text(s: &str) -> Option<Self> {
        let t = s.trim();
        if t.is_empty() {
            return None;
        }
        match DateTime::parse_from_rfc3339(t) {
            Ok(dt) => Some(Published::At(dt.with_timezone(&Utc))),
            Err(_) => Some(Published::Raw(t.to_string())),
        }
    }

    pub fn from_unix(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Published::At)
    }
}

impl fmt::Display for Published {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Published::At(dt) => write!(f, "{}", dt.to_rfc3339()),
            Published::Raw(s) => f.write_str(s),
        }
    }
}

/// One news item about one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRecord {
    pub ticker: String,
    pub title: String,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<Published>,
    pub retrieved_at: DateTime<Utc>,
    pub source: String,
    /// Absent until scored.
    pub score: Option<SentimentScore>,
}

impl NewsRecord {
    /// Minimal record as an adapter produces it; optional fields start empty.
    pub fn new(ticker: &str, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            title: title.into(),
            summary: None,
            url: None,
            published_at: None,
            retrieved_at: Utc::now(),
            source: source.into(),
            score: None,
        }
    }

    /// `(ticker, lowercase+trim(title))`; records sharing it are duplicates.
    pub fn dedup_key(&self) -> (String, String) {
        (self.ticker.clone(), normalize_title(&self.title))
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// One daily OHLC observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Aggregate over a ticker's scored records. Derived, recomputed every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    /// `None` means "no signal" (zero scored records); never read it as 0.0.
    pub mean_sentiment_score: Option<f64>,
    pub article_count: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl TickerSummary {
    /// Mean over records carrying a score. Unscored records are ignored.
    pub fn from_records(ticker: &str, records: &[NewsRecord]) -> Self {
        let mut sum = 0.0f64;
        let mut n = 0usize;
        let (mut pos, mut neu, mut neg) = (0usize, 0usize, 0usize);
        for s in records.iter().filter_map(|r| r.score.as_ref()) {
            sum += s.sentiment_score;
            n += 1;
            match s.sentiment {
                Sentiment::Positive => pos += 1,
                Sentiment::Neutral => neu += 1,
                Sentiment::Negative => neg += 1,
            }
        }
        Self {
            ticker: ticker.to_string(),
            mean_sentiment_score: (n > 0).then(|| sum / n as f64),
            article_count: n,
            positive: pos,
            neutral: neu,
            negative: neg,
        }
    }
}
