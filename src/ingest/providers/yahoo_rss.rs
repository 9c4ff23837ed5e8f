use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::{MalformedItem, SourceFault};
use crate::ingest::providers::http::{fetch_body, Auth};
use crate::ingest::providers::{absolute_url, map_items, Mode};
use crate::ingest::types::{SourceAdapter, SourceBatch};
use crate::ingest::{clean_optional, normalize_text};
use crate::model::{NewsRecord, Published};

const DEFAULT_URL: &str = "https://feeds.finance.yahoo.com/rss/2.0/headline";
const SITE_ROOT: &str = "https://finance.yahoo.com";
const NAME: &str = "yahoo_rss";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_pub_date(ts: &str) -> Option<Published> {
    match OffsetDateTime::parse(ts.trim(), &Rfc2822) {
        Ok(dt) => Published::from_unix(dt.unix_timestamp()),
        Err(_) => Published::from_text(ts),
    }
}

/// Yahoo Finance per-symbol headline feed. Needs no credential.
pub struct YahooRssAdapter {
    mode: Mode,
}

impl YahooRssAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                client,
                base_url: DEFAULT_URL.to_string(),
            },
        }
    }

    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn map_item(ticker: &str, it: Item) -> std::result::Result<NewsRecord, MalformedItem> {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            return Err(MalformedItem("rss item without title".into()));
        }
        let mut rec = NewsRecord::new(ticker, title, "Yahoo Finance");
        rec.summary = clean_optional(it.description.as_deref());
        rec.url = absolute_url(it.link.as_deref(), SITE_ROOT);
        rec.published_at = it.pub_date.as_deref().and_then(parse_pub_date);
        Ok(rec)
    }

    fn parse_feed(xml: &str, ticker: &str, max: usize) -> Result<SourceBatch> {
        let rss: Rss = from_str(xml).context("parsing yahoo rss xml")?;
        let retrieved_at = Utc::now();
        Ok(map_items(NAME, rss.channel.item, max, |it| {
            Self::map_item(ticker, it).map(|mut r| {
                r.retrieved_at = retrieved_at;
                r
            })
        }))
    }
}

#[async_trait]
impl SourceAdapter for YahooRssAdapter {
    async fn fetch(&self, ticker: &str, max_articles: usize) -> Result<SourceBatch> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client, base_url } => {
                let req = client
                    .get(base_url.as_str())
                    .query(&[("s", ticker), ("region", "US"), ("lang", "en-US")]);
                match fetch_body(req, Auth::Keyless).await {
                    Ok(b) => b,
                    Err(fault) => return Ok(SourceBatch::failed(fault)),
                }
            }
        };

        match Self::parse_feed(&body, ticker, max_articles) {
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

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Yahoo</title>
<item><title>Apple &amp; partners unveil &lt;b&gt;new&lt;/b&gt; chips</title><link>https://finance.yahoo.com/news/a.html</link><pubDate>Tue, 07 May 2024 14:30:00 +0000</pubDate><description>Short blurb</description></item>
<item><title>   </title><link>/news/b.html</link></item>
<item><title>Relative link story</title><link>/news/c.html</link><pubDate>yesterday</pubDate></item>
</channel></rss>"#;

    #[tokio::test]
    async fn maps_items_and_drops_untitled() {
        let a = YahooRssAdapter::from_fixture(FEED);
        let batch = a.fetch("AAPL", 10).await.unwrap();
        assert!(batch.fault.is_none());
        assert_eq!(batch.malformed, 1);
        assert_eq!(batch.records.len(), 2);

        let first = &batch.records[0];
        assert_eq!(first.ticker, "AAPL");
        assert_eq!(first.title, "Apple & partners unveil new chips");
        assert_eq!(first.summary.as_deref(), Some("Short blurb"));
        assert!(matches!(first.published_at, Some(Published::At(_))));

        let second = &batch.records[1];
        assert_eq!(
            second.url.as_deref(),
            Some("https://finance.yahoo.com/news/c.html")
        );
        assert_eq!(second.published_at, Some(Published::Raw("yesterday".into())));
    }

    #[tokio::test]
    async fn garbage_payload_is_unavailable_not_an_error() {
        let a = YahooRssAdapter::from_fixture("<html>not a feed");
        let batch = a.fetch("AAPL", 5).await.unwrap();
        assert!(batch.records.is_empty());
        assert!(matches!(batch.fault, Some(SourceFault::Unavailable(_))));
    }

    #[tokio::test]
    async fn throttled_feed_stays_enabled_across_tickers() {
        use std::sync::Arc;
        use std::time::Duration;

        use crate::ingest::providers::http::{build_client, serve_status};
        use crate::FallbackAggregator;

        let base_url = serve_status("403 Forbidden").await;
        let yahoo = YahooRssAdapter {
            mode: Mode::Http {
                client: build_client(Duration::from_secs(5)).unwrap(),
                base_url,
            },
        };

        let direct = yahoo.fetch("AAPL", 5).await.unwrap();
        assert!(matches!(direct.fault, Some(SourceFault::Unavailable(_))));

        let agg = FallbackAggregator::new(vec![Arc::new(yahoo) as Arc<dyn SourceAdapter>]);
        for ticker in ["AAPL", "MSFT"] {
            let out = agg.collect(ticker, 5).await;
            assert_eq!(out.sources_failed, 1, "{ticker}");
            assert_eq!(out.sources_skipped, 0, "{ticker}");
        }
    }

    #[tokio::test]
    async fn empty_channel_is_empty_ok() {
        let a = YahooRssAdapter::from_fixture(
            "<rss version=\"2.0\"><channel><title>t</title></channel></rss>",
        );
        let batch = a.fetch("AAPL", 5).await.unwrap();
        assert!(batch.is_empty_ok());
    }
}
