// src/ingest/providers/newsapi.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MalformedItem, SourceFault};
use crate::ingest::providers::http::{fetch_body, Auth};
use crate::ingest::providers::{absolute_url, map_items, usable_key, Mode};
use crate::ingest::types::{SourceAdapter, SourceBatch};
use crate::ingest::{clean_optional, normalize_text};
use crate::model::{NewsRecord, Published};

const DEFAULT_URL: &str = "https://newsapi.org/v2/everything";
const NAME: &str = "newsapi";
/// Placeholder title NewsAPI uses for withdrawn articles.
const REMOVED: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

/// NewsAPI `everything` search keyed by symbol. Requires `NEWSAPI_KEY`.
pub struct NewsApiAdapter {
    mode: Mode,
    api_key: Option<String>,
}

impl NewsApiAdapter {
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
        let a: Article = serde_json::from_value(raw).map_err(|e| MalformedItem(e.to_string()))?;
        let title = normalize_text(a.title.as_deref().unwrap_or_default());
        if title.is_empty() || title == REMOVED {
            return Err(MalformedItem("newsapi article without usable title".into()));
        }
        let mut rec = NewsRecord::new(ticker, title, "NewsAPI");
        rec.summary = clean_optional(a.description.as_deref());
        rec.url = absolute_url(a.url.as_deref(), "https://newsapi.org");
        rec.published_at = a.published_at.as_deref().and_then(Published::from_text);
        Ok(rec)
    }

    fn parse_body(body: &str, ticker: &str, max: usize) -> Result<SourceBatch> {
        let env: Envelope = serde_json::from_str(body).context("parsing newsapi json")?;
        if env.status != "ok" {
            let code = env.code.unwrap_or_default();
            if code.starts_with("apiKey") {
                return Ok(SourceBatch::failed(SourceFault::Unauthenticated));
            }
            return Ok(SourceBatch::failed(SourceFault::Unavailable(format!(
                "newsapi {code}: {}",
                env.message.unwrap_or_default()
            ))));
        }
        let retrieved_at = Utc::now();
        Ok(map_items(NAME, env.articles, max, |raw| {
            Self::map_item(ticker, raw).map(|mut r| {
                r.retrieved_at = retrieved_at;
                r
            })
        }))
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    async fn fetch(&self, ticker: &str, max_articles: usize) -> Result<SourceBatch> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client, base_url } => {
                let Some(key) = usable_key(&self.api_key) else {
                    return Ok(SourceBatch::failed(SourceFault::Unauthenticated));
                };
                let page_size = max_articles.clamp(1, 100).to_string();
                let req = client
                    .get(base_url.as_str())
                    .header("X-Api-Key", key)
                    .query(&[
                        ("q", ticker),
                        ("language", "en"),
                        ("sortBy", "publishedAt"),
                        ("pageSize", page_size.as_str()),
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
    async fn rejected_key_in_body_is_unauthenticated() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#;
        let batch = NewsApiAdapter::from_fixture(body)
            .fetch("MSFT", 5)
            .await
            .unwrap();
        assert_eq!(batch.fault, Some(SourceFault::Unauthenticated));
    }

    #[tokio::test]
    async fn rate_limited_is_unavailable() {
        let body = r#"{"status":"error","code":"rateLimited","message":"slow down"}"#;
        let batch = NewsApiAdapter::from_fixture(body)
            .fetch("MSFT", 5)
            .await
            .unwrap();
        assert!(matches!(batch.fault, Some(SourceFault::Unavailable(_))));
    }

    #[tokio::test]
    async fn removed_articles_are_dropped() {
        let body = r#"{"status":"ok","totalResults":2,"articles":[
            {"title":"[Removed]","url":"https://removed.com"},
            {"title":"Microsoft expands AI deal","description":"<p>More</p>","url":"https://x.test/m","publishedAt":"2024-05-07T10:00:00Z"}
        ]}"#;
        let batch = NewsApiAdapter::from_fixture(body)
            .fetch("MSFT", 5)
            .await
            .unwrap();
        assert_eq!(batch.malformed, 1);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].summary.as_deref(), Some("More"));
        assert!(matches!(batch.records[0].published_at, Some(Published::At(_))));
    }
}
