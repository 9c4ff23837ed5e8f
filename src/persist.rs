//! # Tabular persistence
//!
//! One CSV file per run date (`financial_news_YYYYMMDD.csv`), one row per news item.
//! Column order is fixed for downstream readers; optional fields are written as empty
//! cells. Appends go out in a single write; a failed write truncates the file back to
//! its previous length, so rows already on disk stay readable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, PersistError};
use crate::model::{NewsRecord, Published, Sentiment, SentimentScore, StockBar};

pub const NEWS_COLUMNS: [&str; 10] = [
    "ticker",
    "title",
    "summary",
    "url",
    "published",
    "source",
    "retrieved_date",
    "sentiment",
    "confidence",
    "sentiment_score",
];

const PARTITION_PREFIX: &str = "financial_news_";
const RETRIEVED_FMT: &str = "%Y-%m-%d %H:%M:%S";

// Field order here is the file's column order.
#[derive(Debug, Serialize, Deserialize)]
struct NewsRow {
    ticker: String,
    title: String,
    summary: Option<String>,
    url: Option<String>,
    published: Option<String>,
    source: String,
    retrieved_date: String,
    sentiment: Option<Sentiment>,
    confidence: Option<f64>,
    sentiment_score: Option<f64>,
}

impl From<&NewsRecord> for NewsRow {
    fn from(r: &NewsRecord) -> Self {
        Self {
            ticker: r.ticker.clone(),
            title: r.title.clone(),
            summary: r.summary.clone(),
            url: r.url.clone(),
            published: r.published_at.as_ref().map(ToString::to_string),
            source: r.source.clone(),
            retrieved_date: r.retrieved_at.format(RETRIEVED_FMT).to_string(),
            sentiment: r.score.map(|s| s.sentiment),
            confidence: r.score.map(|s| s.confidence),
            sentiment_score: r.score.map(|s| s.sentiment_score),
        }
    }
}

impl NewsRow {
    fn into_record(self) -> Result<NewsRecord> {
        let retrieved_at = NaiveDateTime::parse_from_str(&self.retrieved_date, RETRIEVED_FMT)
            .with_context(|| format!("bad retrieved_date {:?}", self.retrieved_date))?
            .and_utc();
        let score = match (self.sentiment, self.confidence, self.sentiment_score) {
            (Some(label), Some(c), Some(s)) => Some(SentimentScore::new(label, c, s)),
            _ => None,
        };
        Ok(NewsRecord {
            ticker: self.ticker,
            title: self.title,
            summary: self.summary,
            url: self.url,
            published_at: self.published.as_deref().and_then(Published::from_text),
            retrieved_at,
            source: self.source,
            score,
        })
    }
}

#[derive(Debug, Serialize)]
struct BarRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReceipt {
    pub path: PathBuf,
    pub rows: usize,
    /// True when this call created the file (and wrote the header).
    pub created: bool,
}

pub struct CsvPersister {
    dir: PathBuf,
}

impl CsvPersister {
    /// Creates the output directory and checks it is writable. Failure here is fatal
    /// for the run.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        let fail = |source| ConfigError::OutputDir {
            path: dir.clone(),
            source,
        };
        fs::create_dir_all(&dir).map_err(fail)?;
        let probe = dir.join(".write_probe");
        fs::write(&probe, b"").map_err(fail)?;
        let _ = fs::remove_file(&probe);
        Ok(Self { dir })
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{PARTITION_PREFIX}{}.csv", date.format("%Y%m%d")))
    }

    /// Append to the date's file, or create it with a header. Empty input is a no-op.
    pub fn append_or_create(
        &self,
        records: &[NewsRecord],
        date: NaiveDate,
    ) -> Result<PersistReceipt, PersistError> {
        let path = self.partition_path(date);
        if records.is_empty() {
            return Ok(PersistReceipt {
                path,
                rows: 0,
                created: false,
            });
        }

        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let mut w = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        for r in records {
            w.serialize(NewsRow::from(r))?;
        }
        let buf = w.into_inner().map_err(|e| PersistError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;

        let io_err = |source| PersistError::Io {
            path: path.clone(),
            source,
        };
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        append_or_rollback(&mut f, &buf, |f, b| f.write_all(b)).map_err(io_err)?;
        f.sync_data().map_err(io_err)?;

        counter!("persist_rows_total").increment(records.len() as u64);
        debug!(path = %path.display(), rows = records.len(), created = needs_header, "rows persisted");

        Ok(PersistReceipt {
            path,
            rows: records.len(),
            created: needs_header,
        })
    }

    /// Overwrite `<TICKER>_stock_data.csv` with the given bars.
    pub fn save_stock_bars(&self, ticker: &str, bars: &[StockBar]) -> Result<PathBuf, PersistError> {
        let path = self.dir.join(format!("{ticker}_stock_data.csv"));
        let mut w = csv::Writer::from_writer(Vec::new());
        for b in bars {
            w.serialize(BarRow {
                date: b.date.format("%Y-%m-%d").to_string(),
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            })?;
        }
        let buf = w.into_inner().map_err(|e| PersistError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;

        let tmp = path.with_extension("csv.tmp");
        let io_err = |source| PersistError::Io {
            path: path.clone(),
            source,
        };
        fs::write(&tmp, &buf).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;
        info!(ticker, bars = bars.len(), path = %path.display(), "saved stock data");
        Ok(path)
    }

    /// Newest `financial_news_*.csv` in the output directory, by name.
    pub fn latest_partition(&self) -> Option<PathBuf> {
        fs::read_dir(&self.dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(PARTITION_PREFIX) && n.ends_with(".csv"))
            })
            .max()
    }
}

/// Run `write`; on error cut the file back to where it ended before.
fn append_or_rollback(
    f: &mut File,
    buf: &[u8],
    write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
) -> io::Result<()> {
    let before = f.metadata()?.len();
    if let Err(e) = write(f, buf) {
        if let Err(trunc) = f.set_len(before) {
            warn!(error = %trunc, "could not roll back partial append");
        }
        return Err(e);
    }
    Ok(())
}

/// Read a partition file back into records.
pub fn load_records(path: &Path) -> Result<Vec<NewsRecord>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for row in rdr.deserialize::<NewsRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        out.push(row.into_record()?);
    }
    Ok(out)
}
