// src/ingest/mod.rs
pub mod aggregator;
pub mod dedup;
pub mod providers;
pub mod types;

pub use aggregator::{AggregateOutcome, FallbackAggregator, FallbackPolicy};
pub use dedup::dedupe;
pub use types::{SourceAdapter, SourceBatch};

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the exposition).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_source_calls_total",
            "Adapter calls issued by the fallback aggregator."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Adapter calls that failed, timed out or panicked."
        );
        describe_counter!(
            "ingest_malformed_items_total",
            "Provider items dropped because they did not map to a record."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Records removed as (ticker, title) duplicates."
        );
        describe_histogram!("ingest_fetch_ms", "Adapter call time in milliseconds.");
    });
}

/// Clean provider text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// `Some(cleaned)` unless the cleaned text is empty.
pub(crate) fn clean_optional(s: Option<&str>) -> Option<String> {
    s.map(normalize_text).filter(|t| !t.is_empty())
}
