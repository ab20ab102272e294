use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::{MarketDataError, MarketDataResult, QuoteFeed};
use crate::engine::types::Quote;

/// Fixed price table. Serves the demo forex rates and stands in for a live
/// feed when offline.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    prices: HashMap<String, Decimal>,
}

impl StaticRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, asset_id: &str, price: Decimal) -> Self {
        self.prices.insert(asset_id.to_uppercase(), price);
        self
    }

    pub fn set_price(&mut self, asset_id: &str, price: Decimal) {
        self.prices.insert(asset_id.to_uppercase(), price);
    }

    /// EUR/USD, GBP/USD, USD/JPY, AUD/USD, USD/CAD keyed as "EURUSD" etc.
    pub fn forex() -> Self {
        [("EURUSD", "1.08"), ("GBPUSD", "1.27"), ("USDJPY", "149.8"), ("AUDUSD", "0.66"), ("USDCAD", "1.36")]
            .into_iter()
            .fold(Self::new(), |rates, (pair, rate)| {
                rates.with_price(pair, Decimal::from_str(rate).unwrap_or_default())
            })
    }
}

#[async_trait::async_trait]
impl QuoteFeed for StaticRates {
    async fn quote(&self, asset_id: &str) -> MarketDataResult<Quote> {
        self.prices
            .get(&asset_id.to_uppercase())
            .map(|price| Quote::new(*price))
            .ok_or_else(|| MarketDataError::NotFound(asset_id.to_string()))
    }
}
