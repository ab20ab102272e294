use tracing::warn;

use crate::engine::types::Quote;
use crate::market_data::adapters::{MarketDataResult, QuoteFeed};

/// Asks `primary` first and answers from `secondary` when it errors.
pub struct Fallback<P, S> {
    pub primary: P,
    pub secondary: S,
}

impl<P, S> Fallback<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait::async_trait]
impl<P: QuoteFeed, S: QuoteFeed> QuoteFeed for Fallback<P, S> {
    async fn quote(&self, asset_id: &str) -> MarketDataResult<Quote> {
        match self.primary.quote(asset_id).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                warn!(asset_id, error = %e, "Primary feed failed, using fallback");
                self.secondary.quote(asset_id).await
            }
        }
    }
}
