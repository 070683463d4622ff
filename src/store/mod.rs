mod report;
mod ticker_store;

pub use report::{StoreSummary, TickerSummary, TickerTrends};
pub use ticker_store::TickerStore;
