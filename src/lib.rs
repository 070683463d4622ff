//! Files LLM-extracted company, ticker and sentiment facts from financial news
//! into one deduplicated JSON collection per ticker.

pub mod ai;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod store;

pub use error::{AppError, ProviderError, Result};
