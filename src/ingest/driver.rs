use std::path::Path;
use std::time::Duration;

use crate::ai::{extraction_prompt, normalize, Completion, ResilientInvoker};
use crate::error::Result;
use crate::models::{NewsEntry, NewsRow};
use crate::store::TickerStore;

use super::NewsReader;

/// Tickers the model uses when it could not name a listed company.
const PLACEHOLDER_TICKERS: &[&str] = &["UNKNOWN", ""];

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Rows at or below this confidence are not filed.
    pub min_confidence: f64,
    /// Pause after each analysed row.
    pub courtesy_delay: Duration,
    /// Log progress every this many processed rows. Zero disables it.
    pub progress_every: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            courtesy_delay: Duration::from_millis(500),
            progress_every: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub rows_read: usize,
    /// Rows without headline and description.
    pub skipped: usize,
    /// Rows sent to the backend.
    pub processed: usize,
    /// Processed rows confident enough to be filed.
    pub successful: usize,
    pub entries_added: usize,
    pub duplicates: usize,
    pub store_failures: usize,
}

/// Drives rows through the backend, the normalizer and the ticker store.
pub struct Ingestor<C> {
    invoker: ResilientInvoker<C>,
    store: TickerStore,
    settings: IngestSettings,
}

impl<C: Completion> Ingestor<C> {
    pub fn new(invoker: ResilientInvoker<C>, store: TickerStore, settings: IngestSettings) -> Self {
        Self {
            invoker,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &TickerStore {
        &self.store
    }

    /// Ingest every row of a delimited news file.
    pub async fn run(&self, path: &Path) -> Result<RunStats> {
        let mut reader = NewsReader::open(path)?;
        tracing::info!(path = %path.display(), "starting ingestion");
        Ok(self.ingest_rows(reader.rows()).await)
    }

    pub async fn ingest_rows(&self, rows: impl IntoIterator<Item = NewsRow>) -> RunStats {
        let mut stats = RunStats::default();

        for row in rows {
            stats.rows_read += 1;
            if row.is_empty() {
                stats.skipped += 1;
                continue;
            }

            self.ingest_row(&row, &mut stats).await;

            stats.processed += 1;
            if self.settings.progress_every > 0 && stats.processed % self.settings.progress_every == 0 {
                tracing::info!(
                    processed = stats.processed,
                    successful = stats.successful,
                    "progress"
                );
            }

            if !self.settings.courtesy_delay.is_zero() {
                tokio::time::sleep(self.settings.courtesy_delay).await;
            }
        }

        tracing::info!(
            processed = stats.processed,
            successful = stats.successful,
            added = stats.entries_added,
            duplicates = stats.duplicates,
            skipped = stats.skipped,
            "ingestion finished"
        );
        stats
    }

    async fn ingest_row(&self, row: &NewsRow, stats: &mut RunStats) {
        let preview: String = row.headline.chars().take(50).collect();
        tracing::info!("Processing: {}...", preview);

        let prompt = extraction_prompt(&row.headline, &row.description);
        let invocation = self.invoker.invoke(&prompt).await;
        let analysis = normalize(invocation.text());

        if analysis.confidence <= self.settings.min_confidence {
            tracing::debug!(confidence = analysis.confidence, "low confidence, not filing");
            return;
        }
        stats.successful += 1;

        for (index, ticker) in analysis.tickers.iter().enumerate() {
            if PLACEHOLDER_TICKERS.contains(&ticker.as_str()) {
                continue;
            }

            let entry = NewsEntry::from_analysis(row, &analysis, index);
            let company = entry.company_name.clone();
            match self.store.append_if_new(ticker, entry) {
                Ok(true) => {
                    stats.entries_added += 1;
                    tracing::info!(
                        "  -> Added to {} ({}): {} sentiment",
                        ticker,
                        company,
                        analysis.sentiment
                    );
                }
                Ok(false) => {
                    stats.duplicates += 1;
                    tracing::debug!(ticker = %ticker, "already filed");
                }
                Err(e) => {
                    stats.store_failures += 1;
                    tracing::error!(ticker = %ticker, error = %e, "failed to file entry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::ai::RetryPolicy;
    use crate::error::ProviderError;
    use crate::models::Sentiment;

    /// Plays back canned answers in order, repeating the last one.
    struct Scripted {
        answers: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Completion for Scripted {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            let answer = if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                answers.front().cloned().unwrap_or_default()
            };
            Ok(answer)
        }
    }

    fn ingestor(answers: &[&str]) -> (TempDir, Ingestor<Arc<Scripted>>, Arc<Scripted>) {
        let temp = TempDir::new().unwrap();
        let store = TickerStore::open(temp.path().join("company_news")).unwrap();
        let settings = IngestSettings {
            courtesy_delay: Duration::ZERO,
            ..IngestSettings::default()
        };
        let backend = Arc::new(Scripted::new(answers));
        let invoker = ResilientInvoker::new(Arc::clone(&backend), RetryPolicy::default());
        (temp, Ingestor::new(invoker, store, settings), backend)
    }

    fn row(headline: &str, timestamp: &str, description: &str) -> NewsRow {
        NewsRow {
            headline: headline.to_string(),
            timestamp: timestamp.to_string(),
            description: description.to_string(),
        }
    }

    const APPLE: &str = r#"{"companies":["Apple Inc."],"tickers":["AAPL"],"sentiment":"positive","sentiment_score":0.6,"key_themes":["earnings"],"confidence":0.9}"#;

    #[tokio::test]
    async fn empty_rows_never_reach_the_backend() {
        let (_temp, ingestor, backend) = ingestor(&[APPLE]);

        let stats = ingestor
            .ingest_rows(vec![row("", "09:30", ""), row("Apple beats", "09:31", "")])
            .await;

        assert_eq!(stats.rows_read, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn low_confidence_rows_are_not_filed() {
        let (_temp, ingestor, _backend) = ingestor(&[
            r#"{"tickers":["AAPL"],"confidence":0.3}"#,
        ]);

        let stats = ingestor.ingest_rows(vec![row("Apple rumour", "09:30", "")]).await;

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.successful, 0);
        assert!(ingestor.store().tickers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_rows_are_filed_once() {
        let (_temp, ingestor, _backend) = ingestor(&[APPLE]);
        let rows = vec![
            row("Apple beats estimates", "2024-03-01 09:30", "Record quarter"),
            row("Apple beats estimates", "2024-03-01 09:30", "Record quarter"),
        ];

        let stats = ingestor.ingest_rows(rows).await;

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.entries_added, 1);
        assert_eq!(stats.duplicates, 1);
        let entries = ingestor.store().load("AAPL");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].company_name, "Apple Inc.");
        assert_eq!(entries[0].sentiment, Sentiment::Positive);
        assert_eq!(entries[0].full_text, "Apple beats estimates Record quarter");
    }

    #[tokio::test]
    async fn fans_out_to_every_real_ticker() {
        let (_temp, ingestor, _backend) = ingestor(&[
            r#"{"companies":["Microsoft Corporation","OpenAI"],"tickers":["MSFT","UNKNOWN","NVDA"],"sentiment":"neutral","confidence":0.8}"#,
        ]);

        let stats = ingestor.ingest_rows(vec![row("AI deal", "10:00", "Chips and models")]).await;

        assert_eq!(stats.entries_added, 2);
        assert_eq!(ingestor.store().tickers().unwrap(), vec!["MSFT", "NVDA"]);
        assert_eq!(ingestor.store().load("NVDA")[0].company_name, "Unknown");
        assert_eq!(ingestor.store().load("MSFT")[0].company_name, "Microsoft Corporation");
    }

    #[tokio::test(start_paused = true)]
    async fn courtesy_delay_follows_each_processed_row() {
        let (_temp, mut ingestor, backend) = ingestor(&[APPLE]);
        ingestor.settings.courtesy_delay = Duration::from_millis(500);
        let rows = vec![
            row("", "09:29", ""),
            row("Apple beats estimates", "09:30", ""),
            row("", "09:31", ""),
            row("Apple raises guidance", "09:32", ""),
        ];

        let start = tokio::time::Instant::now();
        let stats = ingestor.ingest_rows(rows).await;

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.processed, 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn unusable_answers_count_as_processed_only() {
        let (_temp, ingestor, _backend) = ingestor(&["I cannot help with that."]);

        let stats = ingestor.ingest_rows(vec![row("Markets drift", "11:00", "")]).await;

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.successful, 0);
        assert_eq!(stats.entries_added, 0);
    }
}
