mod driver;
mod reader;

pub use driver::{IngestSettings, Ingestor, RunStats};
pub use reader::{sniff_delimiter, NewsReader};
