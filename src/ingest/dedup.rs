// src/ingest/dedup.rs
use std::collections::HashSet;

use crate::model::NewsRecord;

/// Keep the first record for every `(ticker, normalized title)` key, in input order.
/// Idempotent; different tickers never collide.
pub fn dedupe(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    dedupe_counted(records).0
}

/// Same as [`dedupe`], also returning how many records were dropped.
pub fn dedupe_counted(records: Vec<NewsRecord>) -> (Vec<NewsRecord>, usize) {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(records.len());
    let mut keep = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for rec in records {
        if seen.insert(rec.dedup_key()) {
            keep.push(rec);
        } else {
            dropped += 1;
        }
    }

    (keep, dropped)
}
