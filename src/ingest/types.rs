// src/ingest/types.rs
use anyhow::Result;

use crate::error::SourceFault;
use crate::model::NewsRecord;

/// What one adapter call produced. Ordinary failures come back as an empty batch
/// with `fault` set; `Err` from `fetch` is reserved for adapter bugs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<NewsRecord>,
    pub fault: Option<SourceFault>,
    /// Items dropped by the provider mapping.
    pub malformed: usize,
}

impl SourceBatch {
    pub fn ok(records: Vec<NewsRecord>, malformed: usize) -> Self {
        Self {
            records,
            fault: None,
            malformed,
        }
    }

    pub fn failed(fault: SourceFault) -> Self {
        Self {
            records: Vec::new(),
            fault: Some(fault),
            malformed: 0,
        }
    }

    /// Valid response with zero items.
    pub fn is_empty_ok(&self) -> bool {
        self.fault.is_none() && self.records.is_empty()
    }
}

/// One news provider. Implementations only differ in how they map provider items.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, ticker: &str, max_articles: usize) -> Result<SourceBatch>;
    fn name(&self) -> &'static str;
}
