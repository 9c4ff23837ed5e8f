// src/config/mod.rs
//! Run configuration, built once at startup and passed into constructors.
//!
//! Lookup order for the TOML file:
//! 1) `$PIPELINE_CONFIG_PATH` (must exist when set)
//! 2) `config/pipeline.toml`
//! 3) built-in defaults
//!
//! Credentials never live in the file; they come from the environment (and `.env`).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::ingest::FallbackPolicy;
use crate::model::Ticker;
use crate::sentiment::ScorerKind;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

pub const DEFAULT_TICKERS: [&str; 7] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "NVDA", "META"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tickers: Vec<String>,
    /// Per-ticker news cap.
    pub max_articles: usize,
    /// Price lookback window in days.
    pub lookback_days: u32,
    /// Pause between tickers, a courtesy rate limit.
    pub request_delay_ms: u64,
    /// Tickers processed at once; 1 = sequential.
    pub concurrency: usize,
    pub http_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub fallback_policy: FallbackPolicy,
    /// Source names in priority order.
    pub sources: Vec<String>,
    pub scorer: ScorerKind,
    pub scorer_daily_limit: u32,
    pub scorer_cache_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect(),
            max_articles: 5,
            lookback_days: 30,
            request_delay_ms: 1_000,
            concurrency: 1,
            http_timeout_secs: 10,
            output_dir: PathBuf::from("data"),
            fallback_policy: FallbackPolicy::UntilCap,
            sources: vec!["yahoo_rss".into(), "finnhub".into(), "newsapi".into()],
            scorer: ScorerKind::Lexicon,
            scorer_daily_limit: 200,
            scorer_cache_dir: PathBuf::from("cache/sentiment"),
        }
    }
}

impl PipelineConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let cfg: PipelineConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(ConfigError::File {
                path: pb,
                message: format!("{ENV_CONFIG_PATH} points to a non-existent path"),
            });
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        self.max_articles = self.max_articles.max(1);
        self.concurrency = self.concurrency.clamp(1, 16);
        self.http_timeout_secs = self.http_timeout_secs.clamp(1, 60);
        self.lookback_days = self.lookback_days.max(1);
        self.sources = self
            .sources
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// API credentials, read once from the environment. Blank values count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub finnhub_api_key: Option<String>,
    pub newsapi_key: Option<String>,
    pub hf_api_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            finnhub_api_key: var("FINNHUB_API_KEY"),
            newsapi_key: var("NEWSAPI_KEY"),
            hf_api_token: var("HF_API_TOKEN"),
        }
    }
}

// Keys stay out of logs; only their length is shown.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("finnhub_api_key_len", &self.finnhub_api_key.as_ref().map(String::len))
            .field("newsapi_key_len", &self.newsapi_key.as_ref().map(String::len))
            .field("hf_api_token_len", &self.hf_api_token.as_ref().map(String::len))
            .finish()
    }
}

/// Explicit symbols win over the configured list. Invalid symbols are dropped with a
/// warning, duplicates collapse (first wins), and an empty result is fatal.
pub fn resolve_tickers(args: &[String], cfg: &PipelineConfig) -> Result<Vec<Ticker>, ConfigError> {
    let raw: &[String] = if args.is_empty() { &cfg.tickers } else { args };

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for r in raw {
        match Ticker::parse(r) {
            Ok(t) => {
                if seen.insert(t.clone()) {
                    out.push(t);
                }
            }
            Err(e) => warn!(error = %e, "skipping ticker"),
        }
    }

    if out.is_empty() {
        return Err(ConfigError::NoTickers);
    }
    Ok(out)
}
