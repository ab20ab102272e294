// Source: https://www.alphavantage.co/query?function=GLOBAL_QUOTE
// Every field is a string; an unknown symbol comes back as an empty object.
#[derive(Debug, serde::Deserialize)]
pub struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    pub global_quote: Option<GlobalQuote>,
    // Present instead of data when the key is throttled
    #[serde(rename = "Note", default)]
    pub note: Option<String>,
    #[serde(rename = "Information", default)]
    pub information: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct GlobalQuote {
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,
    #[serde(rename = "05. price", default)]
    pub price: Option<String>,
    #[serde(rename = "06. volume", default)]
    pub volume: Option<String>,
    #[serde(rename = "09. change", default)]
    pub change: Option<String>,
    #[serde(rename = "10. change percent", default)]
    pub change_percent: Option<String>,
}

/// Parsed stock quote with the day's change.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StockAsset {
    pub symbol: String,
    pub name: String,
    pub price: rust_decimal::Decimal,
    pub change: rust_decimal::Decimal,
    pub change_percent: rust_decimal::Decimal,
    pub volume: u64,
}
