//! biotools-annotate: enrich and score Pub2Tools candidates with a locally
//! hosted LLM, and emit bio.tools-ready payloads plus assessment reports.
//!
//! The pipeline stages are: gather (file input or the Pub2Tools CLI), dedup,
//! enrich (homepage scraping + Europe PMC), score (Ollama with schema-repair
//! retries, heuristic fallback), and output (payload, JSONL and CSV reports).

pub mod assess;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod sources;
pub mod utils;

pub use config::Config;
pub use error::AnnotateError;
