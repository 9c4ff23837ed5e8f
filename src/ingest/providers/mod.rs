// src/ingest/providers/mod.rs
//! Concrete news sources. Each provider owns a narrow `map_item` that turns one
//! provider item into a `NewsRecord`; everything else is shared here.

pub mod finnhub;
pub mod http;
pub mod newsapi;
pub mod yahoo_rss;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Credentials;
use crate::error::MalformedItem;
use crate::ingest::types::{SourceAdapter, SourceBatch};
use crate::model::NewsRecord;

use finnhub::FinnhubAdapter;
use newsapi::NewsApiAdapter;
use yahoo_rss::YahooRssAdapter;

/// Instantiate the configured sources in priority order. Unknown or repeated
/// names are ignored with a warning.
pub fn build_sources(
    names: &[String],
    creds: &Credentials,
    client: &reqwest::Client,
) -> Vec<Arc<dyn SourceAdapter>> {
    let mut out: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for name in names {
        let adapter: Arc<dyn SourceAdapter> = match name.as_str() {
            "yahoo_rss" => Arc::new(YahooRssAdapter::new(client.clone())),
            "finnhub" => Arc::new(FinnhubAdapter::new(
                client.clone(),
                creds.finnhub_api_key.clone(),
            )),
            "newsapi" => Arc::new(NewsApiAdapter::new(
                client.clone(),
                creds.newsapi_key.clone(),
            )),
            other => {
                warn!(target: "ingest", source = other, "unknown news source in config, ignoring");
                continue;
            }
        };
        if out.iter().any(|a| a.name() == adapter.name()) {
            warn!(target: "ingest", source = adapter.name(), "news source listed twice, ignoring repeat");
            continue;
        }
        out.push(adapter);
    }
    out
}

/// Where a provider reads its payload from.
pub(crate) enum Mode {
    /// Canned payload (tests and offline runs).
    Fixture(String),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

/// Maps provider items until `max` records are produced. Items failing the mapping
/// are counted and dropped; siblings are unaffected.
pub(crate) fn map_items<T, F>(
    source: &'static str,
    items: impl IntoIterator<Item = T>,
    max: usize,
    mut map: F,
) -> SourceBatch
where
    F: FnMut(T) -> Result<NewsRecord, MalformedItem>,
{
    let mut records = Vec::new();
    let mut malformed = 0usize;
    for item in items {
        if records.len() >= max {
            break;
        }
        match map(item) {
            Ok(rec) => records.push(rec),
            Err(e) => {
                malformed += 1;
                debug!(target: "ingest", source, error = %e, "dropping item");
            }
        }
    }
    SourceBatch::ok(records, malformed)
}

/// Resolve a possibly relative link against the provider's site root.
pub(crate) fn absolute_url(link: Option<&str>, site_root: &str) -> Option<String> {
    let l = link?.trim();
    if l.is_empty() {
        None
    } else if l.starts_with("http://") || l.starts_with("https://") {
        Some(l.to_string())
    } else if l.starts_with('/') {
        Some(format!("{}{}", site_root.trim_end_matches('/'), l))
    } else {
        None
    }
}

/// Blank or absent credential → `None`.
pub(crate) fn usable_key(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}
