/// Build the extraction prompt for one news item.
pub fn extraction_prompt(headline: &str, description: &str) -> String {
    format!(
        r#"
Analyze this financial news and extract information in JSON format:

Headline: {headline}
Description: {description}

Please provide a JSON response with:
1. "companies": List of company names mentioned (full company names, not abbreviations)
2. "tickers": List of stock ticker symbols for the companies (if publicly traded, use actual tickers like AAPL, GOOGL, etc.)
3. "sentiment": Overall sentiment ("positive", "negative", or "neutral")
4. "sentiment_score": Numerical score from -1 (very negative) to +1 (very positive)
5. "key_themes": List of main themes/topics in the news
6. "confidence": Confidence level in the analysis (0-1)

Guidelines:
- Use official company names (e.g., "Apple Inc." not "Apple")
- Use correct stock tickers (e.g., "META" for Facebook/Meta, "GOOGL" for Google/Alphabet)
- If company is private or not publicly traded, use "PRIVATE" as ticker
- Be accurate with sentiment analysis considering business impact
- If unsure about a ticker, use "UNKNOWN"

Return only valid JSON, no additional text.
"#
    )
}
