use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Deserializes from any label: unrecognized or missing labels read as neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Case-insensitive label match. Unrecognized labels are `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .and_then(Self::from_label)
            .unwrap_or_default())
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured facts extracted from one news row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub companies: Vec<String>,
    /// Index-aligned with `companies`.
    pub tickers: Vec<String>,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub key_themes: Vec<String>,
    pub confidence: f64,
}

impl AnalysisResult {
    /// The result used when nothing usable came back from the backend.
    pub fn empty() -> Self {
        Self {
            companies: Vec::new(),
            tickers: Vec::new(),
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.0,
            key_themes: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Company paired with the ticker at `index`, or "Unknown" when the model
    /// returned fewer companies than tickers.
    pub fn company_for(&self, index: usize) -> &str {
        self.companies
            .get(index)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::empty()
    }
}
