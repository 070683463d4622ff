use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{AnalysisResult, Sentiment};

/// Confidence assumed when the model answered but left the field out.
const DEFAULT_CONFIDENCE: f64 = 0.5;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A```[\w+-]*\s*(.*?)\s*(?:```)?\z").expect("fence pattern is valid")
    })
}

/// Remove one layer of Markdown code fence, with or without a language tag.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    fence_pattern()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str())
        .unwrap_or(trimmed)
}

/// Turn raw backend output into an [`AnalysisResult`]. Never fails: anything
/// unusable becomes [`AnalysisResult::empty`].
pub fn normalize(raw: Option<&str>) -> AnalysisResult {
    let Some(raw) = raw else {
        return AnalysisResult::empty();
    };

    let body = strip_code_fence(raw);
    let fields = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            tracing::warn!(response = %raw, kind = json_kind(&other), "analysis response is not a JSON object");
            return AnalysisResult::empty();
        }
        Err(e) => {
            tracing::warn!(error = %e, response = %raw, "could not parse analysis response");
            return AnalysisResult::empty();
        }
    };

    AnalysisResult {
        companies: string_list(&fields, "companies", false),
        tickers: string_list(&fields, "tickers", true),
        sentiment: present(&fields, "sentiment")
            .and_then(Value::as_str)
            .and_then(Sentiment::from_label)
            .unwrap_or_default(),
        sentiment_score: present(&fields, "sentiment_score")
            .map(|v| number(v).unwrap_or(0.0))
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0),
        key_themes: string_list(&fields, "key_themes", false),
        confidence: present(&fields, "confidence")
            .map(|v| number(v).unwrap_or(0.0))
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0),
    }
}

/// A field counts as absent when missing or `null`.
fn present<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|v| !v.is_null())
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn string_list(fields: &Map<String, Value>, name: &str, upper: bool) -> Vec<String> {
    let Some(Value::Array(items)) = present(fields, name) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if upper { s.to_uppercase() } else { s.to_string() })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
