mod analysis;
mod news;

pub use analysis::{AnalysisResult, Sentiment};
pub use news::{NewsEntry, NewsRow};
