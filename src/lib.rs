// src/lib.rs
// Library surface shared by the binary and the integration tests.

pub mod batch;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod prices;
pub mod sentiment;
pub mod telemetry;

// ---- Re-exports for the common wiring path ----
pub use batch::{BatchReport, BatchRunner, CancelFlag, TickerOutcome};
pub use config::{Credentials, PipelineConfig};
pub use ingest::{FallbackAggregator, FallbackPolicy, SourceAdapter, SourceBatch};
pub use model::{NewsRecord, Sentiment, SentimentScore, StockBar, Ticker, TickerSummary};
pub use persist::CsvPersister;
pub use pipeline::{TickerPipeline, TickerProcessor, TickerReport};
