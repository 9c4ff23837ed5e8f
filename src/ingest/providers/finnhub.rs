// src/ingest/providers/finnhub.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MalformedItem, SourceFault};
use crate::ingest::providers::http::{fetch_body, Auth};
use crate::ingest::providers::{absolute_url, map_items, usable_key, Mode};
use crate::ingest::types::{SourceAdapter, SourceBatch};
use crate::ingest::{clean_optional, normalize_text};
use crate::model::{NewsRecord, Published};

const DEFAULT_URL: &str = "https://finnhub.io/api/v1/company-news";
const NAME: &str = "finnhub";
/// Company news is requested over this many trailing days.
const LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct Item {
    headline: Option<String>,
    summary: Option<String>,
    url: Option<String>,
    /// Unix seconds.
    datetime: Option<i64>,
}

/// Finnhub company-news endpoint. Requires `FINNHUB_API_KEY`.
pub struct FinnhubAdapter {
    mode: Mode,
    api_key: Option<String>,
}

impl FinnhubAdapter {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            mode: Mode::Http {
                client,
                base_url: DEFAULT_URL.to_string(),
            },
            api_key,
        }
    }

    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
            api_key: None,
        }
    }

    fn map_item(ticker: &str, raw: Value) -> std::result::Result<NewsRecord, MalformedItem> {
        let it: Item = serde_json::from_value(raw).map_err(|e| MalformedItem(e.to_string()))?;
        let title = normalize_text(it.headline.as_deref().unwrap_or_default());
        if title.is_empty() {
            return Err(MalformedItem("finnhub item without headline".into()));
        }
        let mut rec = NewsRecord::new(ticker, title, "Finnhub");
        rec.summary = clean_optional(it.summary.as_deref());
        rec.url = absolute_url(it.url.as_deref(), "https://finnhub.io");
        rec.published_at = it.datetime.filter(|t| *t > 0).and_then(Published::from_unix);
        Ok(rec)
    }

    fn parse_body(body: &str, ticker: &str, max: usize) -> Result<SourceBatch> {
        let items: Vec<Value> =
            serde_json::from_str(body).context("parsing finnhub company-news json")?;
        let retrieved_at = Utc::now();
        Ok(map_items(NAME, items, max, |raw| {
            Self::map_item(ticker, raw).map(|mut r| {
                r.retrieved_at = retrieved_at;
                r
            })
        }))
    }
}

#[async_trait]
impl SourceAdapter for FinnhubAdapter {
    async fn fetch(&self, ticker: &str, max_articles: usize) -> Result<SourceBatch> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client, base_url } => {
                let Some(key) = usable_key(&self.api_key) else {
                    return Ok(SourceBatch::failed(SourceFault::Unauthenticated));
                };
                let to = Utc::now().date_naive();
                let from = to - ChronoDuration::days(LOOKBACK_DAYS);
                let req = client
                    .get(base_url.as_str())
                    .header("X-Finnhub-Token", key)
                    .query(&[
                        ("symbol", ticker.to_string()),
                        ("from", from.format("%Y-%m-%d").to_string()),
                        ("to", to.format("%Y-%m-%d").to_string()),
                    ]);
                match fetch_body(req, Auth::Keyed).await {
                    Ok(b) => b,
                    Err(fault) => return Ok(SourceBatch::failed(fault)),
                }
            }
        };

        match Self::parse_body(&body, ticker, max_articles) {
            Ok(batch) => Ok(batch),
            Err(e) => Ok(SourceBatch::failed(SourceFault::Unavailable(format!(
                "malformed payload: {e:#}"
            )))),
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_unauthenticated_without_network() {
        let client = reqwest::Client::new();
        let a = FinnhubAdapter::new(client, Some("   ".into()));
        let batch = a.fetch("AAPL", 5).await.unwrap();
        assert_eq!(batch.fault, Some(SourceFault::Unauthenticated));
        assert!(batch.records.is_empty());
    }

    #[tokio::test]
    async fn bad_item_does_not_poison_siblings() {
        let body = r#"[
            {"headline": "Apple boosts buyback", "datetime": 1715000000, "url": "https://x.test/1", "summary": "s"},
            {"headline": 42},
            {"headline": "", "url": "https://x.test/3"},
            {"headline": "Apple supplier warns", "datetime": 0}
        ]"#;
        let a = FinnhubAdapter::from_fixture(body);
        let batch = a.fetch("AAPL", 10).await.unwrap();
        assert_eq!(batch.malformed, 2);
        let titles: Vec<_> = batch.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple boosts buyback", "Apple supplier warns"]);
        assert!(batch.records[0].published_at.is_some());
        assert!(batch.records[1].published_at.is_none());
    }

    #[tokio::test]
    async fn error_object_is_reported_as_unavailable() {
        let a = FinnhubAdapter::from_fixture(r#"{"error": "API limit reached"}"#);
        let batch = a.fetch("AAPL", 5).await.unwrap();
        assert!(matches!(batch.fault, Some(SourceFault::Unavailable(_))));
    }
}
