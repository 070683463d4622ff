use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::{AnalysisResult, Sentiment};

/// One row of the input file, with column aliases already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsRow {
    pub headline: String,
    pub timestamp: String,
    pub description: String,
}

impl NewsRow {
    pub fn is_empty(&self) -> bool {
        self.headline.is_empty() && self.description.is_empty()
    }
}

/// A news row as filed under one ticker.
///
/// Reading is lenient so files written by earlier versions still load: missing
/// fields take their defaults and `processed_date` may lack a UTC offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsEntry {
    pub timestamp: String,
    pub headline: String,
    pub description: String,
    pub company_name: String,
    pub ticker: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub key_themes: Vec<String>,
    pub confidence: f64,
    pub full_text: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub processed_date: DateTime<Utc>,
}

/// Formats accepted for offset-less timestamps, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("unrecognized timestamp '{}'", raw)))
}

impl NewsEntry {
    pub fn from_analysis(row: &NewsRow, analysis: &AnalysisResult, index: usize) -> Self {
        let ticker = analysis.tickers.get(index).cloned().unwrap_or_default();
        Self {
            timestamp: row.timestamp.clone(),
            headline: row.headline.clone(),
            description: row.description.clone(),
            company_name: analysis.company_for(index).to_string(),
            ticker,
            sentiment: analysis.sentiment,
            sentiment_score: analysis.sentiment_score,
            key_themes: analysis.key_themes.clone(),
            confidence: analysis.confidence,
            full_text: format!("{} {}", row.headline, row.description)
                .trim()
                .to_string(),
            processed_date: Utc::now(),
        }
    }

    /// Two entries with the same key describe the same story.
    pub fn same_story(&self, headline: &str, timestamp: &str) -> bool {
        self.headline == headline && self.timestamp == timestamp
    }
}
