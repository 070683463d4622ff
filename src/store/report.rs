use std::collections::HashMap;
use std::fmt;

use super::TickerStore;
use crate::error::Result;
use crate::models::Sentiment;

const TOP_THEMES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSummary {
    pub ticker: String,
    pub count: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub tickers: Vec<TickerSummary>,
    pub total: usize,
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tickers {
            writeln!(
                f,
                "{}: {} items (P:{}, N:{}, Neu:{})",
                t.ticker, t.count, t.positive, t.negative, t.neutral
            )?;
        }
        write!(f, "\nTotal news items: {}", self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerTrends {
    pub ticker: String,
    pub total: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Most mentioned themes, highest count first.
    pub top_themes: Vec<(String, usize)>,
}

impl fmt::Display for TickerTrends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trend analysis for {}:", self.ticker)?;
        writeln!(f, "Total articles: {}", self.total)?;
        writeln!(f, "Average sentiment score: {:.3}", self.average_score)?;
        writeln!(
            f,
            "Sentiment range: {:.3} to {:.3}",
            self.min_score, self.max_score
        )?;
        write!(f, "\nTop themes:")?;
        for (theme, count) in &self.top_themes {
            write!(f, "\n  {}: {} mentions", theme, count)?;
        }
        Ok(())
    }
}

impl TickerStore {
    /// Entry counts and sentiment distribution for every ticker file.
    pub fn summary(&self) -> Result<StoreSummary> {
        let mut summary = StoreSummary::default();
        for ticker in self.tickers()? {
            let entries = self.load(&ticker);
            let count_of = |wanted: Sentiment| entries.iter().filter(|e| e.sentiment == wanted).count();
            let row = TickerSummary {
                count: entries.len(),
                positive: count_of(Sentiment::Positive),
                negative: count_of(Sentiment::Negative),
                neutral: count_of(Sentiment::Neutral),
                ticker,
            };
            summary.total += row.count;
            summary.tickers.push(row);
        }
        Ok(summary)
    }

    /// Score statistics and recurring themes for one ticker. `None` when nothing
    /// is filed under it.
    pub fn trends(&self, ticker: &str) -> Option<TickerTrends> {
        let entries = self.load(ticker);
        if entries.is_empty() {
            return None;
        }

        let scores: Vec<f64> = entries.iter().map(|e| e.sentiment_score).collect();
        let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average_score = scores.iter().sum::<f64>() / scores.len() as f64;

        let mut mentions: HashMap<&str, usize> = HashMap::new();
        for theme in entries.iter().flat_map(|e| e.key_themes.iter()) {
            *mentions.entry(theme.as_str()).or_default() += 1;
        }
        let mut top_themes: Vec<(String, usize)> = mentions
            .into_iter()
            .map(|(theme, count)| (theme.to_string(), count))
            .collect();
        top_themes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_themes.truncate(TOP_THEMES);

        Some(TickerTrends {
            ticker: ticker.trim().to_uppercase(),
            total: entries.len(),
            average_score,
            min_score,
            max_score,
            top_themes,
        })
    }
}
