//! File cache + daily call limit in front of a paid/rate-limited scorer.
//! Cache hits are free; only successful upstream calls count against the limit.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::SentimentScore;
use crate::sentiment::SentimentScorer;

pub struct CachingScorer<S: SentimentScorer> {
    inner: S,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<S: SentimentScorer> CachingScorer<S> {
    pub fn new(inner: S, cache_dir: PathBuf, daily_limit: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }

    fn cache_key(&self, text: &str) -> String {
        let mut h = Sha256::new();
        h.update(self.inner.name().as_bytes());
        h.update([0u8]);
        h.update(text.as_bytes());
        h.finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
    }

    fn limit_reached(&self) -> bool {
        let mut g = match self.counter.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        if g.is_expired() {
            g.reset_to_today();
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        g.count >= self.daily_limit
    }

    fn record_call(&self) {
        let mut g = match self.counter.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        g.count = g.count.saturating_add(1);
        let _ = save_daily_counter(&self.cache_dir, &g);
    }
}

#[async_trait::async_trait]
impl<S: SentimentScorer> SentimentScorer for CachingScorer<S> {
    async fn score(&self, text: &str) -> Result<SentimentScore> {
        let key = self.cache_key(text);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Ok(hit);
        }

        if self.limit_reached() {
            bail!(
                "daily scoring limit of {} calls reached for {}",
                self.daily_limit,
                self.inner.name()
            );
        }

        let fresh = self.inner.score(text).await?;
        let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        self.record_call();
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<SentimentScore> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &SentimentScore) -> io::Result<()> {
    let path = cache_path(dir, key);
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    write_atomic(&path, json.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    fs::rename(tmp, path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let s = serde_json::to_string(dc).map_err(io::Error::other)?;
    write_atomic(&counter_path(dir), s.as_bytes())
}
