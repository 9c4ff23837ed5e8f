//! # Price collaborator
//! Daily OHLC bars for a ticker over a date window. The pipeline treats any error here
//! as "no price series" and carries on with news.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::model::StockBar;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Bars with `start <= date <= end`, ascending, at most one per day. May be empty.
    async fn get_prices(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<StockBar>>;
    fn name(&self) -> &'static str;
}

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

/// Yahoo Finance chart endpoint, daily interval.
pub struct YahooChartSource {
    mode: Mode,
}

impl YahooChartSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http { client },
        }
    }

    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }

    /// Rows with a null or negative field are skipped; a later bar on the same day wins.
    pub fn parse_chart(body: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<StockBar>> {
        let env: ChartEnvelope = serde_json::from_str(body).context("parsing chart json")?;
        if let Some(err) = env.chart.error {
            bail!(
                "chart error {}: {}",
                err.code.unwrap_or_default(),
                err.description.unwrap_or_default()
            );
        }
        let Some(result) = env.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();
        let mut by_day: BTreeMap<NaiveDate, StockBar> = BTreeMap::new();
        for (i, ts) in result.timestamp.iter().enumerate() {
            let Some(date) = DateTime::from_timestamp(*ts, 0).map(|d| d.date_naive()) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
                at(&quote.volume, i),
            ) else {
                continue;
            };
            if [open, high, low, close, volume].iter().any(|x| !x.is_finite() || *x < 0.0) {
                continue;
            }
            by_day.insert(
                date,
                StockBar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume: volume.round() as u64,
                },
            );
        }

        Ok(by_day.into_values().collect())
    }
}

#[async_trait]
impl PriceSource for YahooChartSource {
    async fn get_prices(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<StockBar>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client } => {
                let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
                // end is inclusive
                let period2 = end
                    .succ_opt()
                    .unwrap_or(end)
                    .and_time(NaiveTime::MIN)
                    .and_utc()
                    .timestamp();
                let resp = client
                    .get(format!("{CHART_URL}/{ticker}"))
                    .query(&[
                        ("period1", period1.to_string()),
                        ("period2", period2.to_string()),
                        ("interval", "1d".to_string()),
                    ])
                    .send()
                    .await
                    .map_err(|e| anyhow!("chart request failed: {}", e.without_url()))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("chart endpoint returned {status}");
                }
                resp.text().await.context("reading chart body")?
            }
        };
        Self::parse_chart(&body, start, end)
    }

    fn name(&self) -> &'static str {
        "yahoo_chart"
    }
}
