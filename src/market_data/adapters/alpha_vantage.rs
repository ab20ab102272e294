use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use super::alpha_vantage_types::{GlobalQuote, GlobalQuoteResponse, StockAsset};
use super::{MarketDataError, MarketDataResult, QuoteFeed};
use crate::engine::types::Quote;
use crate::market_data::normaliser::Normaliser;

/// Symbols offered when searching stocks.
pub const POPULAR_SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"];

pub struct AlphaVantageAdapter {
    pub base_url: String, // "https://www.alphavantage.co/query"
    api_key: String,
    client: reqwest::Client,
    normaliser: Normaliser,
}

impl AlphaVantageAdapter {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            normaliser: Normaliser::new(4),
        }
    }

    #[instrument(skip(self))]
    pub async fn stock(&self, symbol: &str) -> MarketDataResult<StockAsset> {
        let res = self
            .client
            .get(&self.base_url)
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body: GlobalQuoteResponse = res.json().await?;
        self.parse_response(symbol, body)
    }

    /// Quotes for [`POPULAR_SYMBOLS`]; symbols that fail are skipped.
    pub async fn popular_stocks(&self) -> Vec<StockAsset> {
        let results = join_all(POPULAR_SYMBOLS.iter().map(|symbol| self.stock(symbol))).await;
        POPULAR_SYMBOLS
            .iter()
            .zip(results)
            .filter_map(|(symbol, result)| match result {
                Ok(stock) => Some(stock),
                Err(e) => {
                    warn!(symbol, error = %e, "Skipping stock");
                    None
                }
            })
            .collect()
    }

    fn parse_response(&self, symbol: &str, body: GlobalQuoteResponse) -> MarketDataResult<StockAsset> {
        if let Some(note) = body.note.or(body.information) {
            warn!(symbol, note = %note, "Alpha Vantage throttled the request");
            return Err(MarketDataError::RateLimited(note));
        }
        let quote = body
            .global_quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;
        self.stock_from(symbol, quote)
    }

    fn stock_from(&self, symbol: &str, quote: GlobalQuote) -> MarketDataResult<StockAsset> {
        let raw_price = quote.price.unwrap_or_default();
        let price = self
            .normaliser
            .quote_price_from_str(&raw_price)
            .ok_or_else(|| MarketDataError::BadPrice {
                asset_id: symbol.to_string(),
                value: raw_price,
            })?;
        let decimal_or_zero = |field: Option<String>| {
            field
                .and_then(|s| self.normaliser.price_from_str(&s))
                .unwrap_or(Decimal::ZERO)
        };

        Ok(StockAsset {
            symbol: symbol.to_string(),
            // GLOBAL_QUOTE carries no company name
            name: symbol.to_string(),
            price,
            change: decimal_or_zero(quote.change),
            change_percent: decimal_or_zero(quote.change_percent),
            volume: quote.volume.and_then(|v| v.trim().parse().ok()).unwrap_or(0),
        })
    }
}

#[async_trait::async_trait]
impl QuoteFeed for AlphaVantageAdapter {
    async fn quote(&self, asset_id: &str) -> MarketDataResult<Quote> {
        let stock = self.stock(asset_id).await?;
        debug!(symbol = %stock.symbol, price = %stock.price, "Fetched Alpha Vantage quote");
        Ok(Quote::new(stock.price))
    }
}
