// Shared trait + error for quote sources

use crate::engine::types::Quote;

#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("no quote available for '{0}'")]
    NotFound(String),
    #[error("malformed price '{value}' for '{asset_id}'")]
    BadPrice { asset_id: String, value: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
}

pub type MarketDataResult<T> = Result<T, MarketDataError>;

#[async_trait::async_trait]
pub trait QuoteFeed: Send + Sync {
    /// Latest price for `asset_id` in the feed's own id scheme.
    async fn quote(&self, asset_id: &str) -> MarketDataResult<Quote>;
}

pub mod alpha_vantage;
pub mod alpha_vantage_types;
pub mod coingecko;
pub mod coingecko_types;
pub mod static_rates;
