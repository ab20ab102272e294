use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::coingecko_types::{CryptoAsset, SimplePrice};
use super::{MarketDataError, MarketDataResult, QuoteFeed};
use crate::engine::types::Quote;
use crate::market_data::normaliser::Normaliser;

const VS_CURRENCY: &str = "usd";
const MARKETS_PER_PAGE: u32 = 20;

pub struct CoinGeckoAdapter {
    pub base_url: String, // "https://api.coingecko.com/api/v3"
    client: reqwest::Client,
    normaliser: Normaliser,
}

impl CoinGeckoAdapter {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            normaliser: Normaliser::default(),
        }
    }

    /// Top coins by market cap (the market overview list).
    #[instrument(skip(self))]
    pub async fn markets(&self) -> MarketDataResult<Vec<CryptoAsset>> {
        let per_page = MARKETS_PER_PAGE.to_string();
        let res = self
            .client
            .get(format!("{}/coins/markets", self.base_url))
            .query(&[
                ("vs_currency", VS_CURRENCY),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ])
            .send()
            .await?;
        let res = check_status(res)?;
        let assets: Vec<CryptoAsset> = res.json().await?;
        debug!(count = assets.len(), "Fetched crypto markets");
        Ok(assets)
    }

    fn price_from(&self, asset_id: &str, body: &SimplePrice) -> MarketDataResult<Quote> {
        let raw = body
            .get(asset_id)
            .and_then(|prices| prices.get(VS_CURRENCY))
            .copied()
            .ok_or_else(|| MarketDataError::NotFound(asset_id.to_string()))?;
        let price = self
            .normaliser
            .quote_price_from_f64(raw)
            .ok_or_else(|| MarketDataError::BadPrice {
                asset_id: asset_id.to_string(),
                value: raw.to_string(),
            })?;
        Ok(Quote::new(price))
    }
}

fn check_status(res: reqwest::Response) -> MarketDataResult<reqwest::Response> {
    if res.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketDataError::RateLimited(res.url().to_string()));
    }
    Ok(res.error_for_status()?)
}

#[async_trait::async_trait]
impl QuoteFeed for CoinGeckoAdapter {
    #[instrument(skip(self))]
    async fn quote(&self, asset_id: &str) -> MarketDataResult<Quote> {
        let res = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", asset_id), ("vs_currencies", VS_CURRENCY)])
            .send()
            .await?;
        let body: SimplePrice = check_status(res)?.json().await?;
        let quote = self.price_from(asset_id, &body)?;
        debug!(price = %quote.price, "Fetched CoinGecko quote");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_price_from_simple_price() {
        let adapter = CoinGeckoAdapter::new("https://api.coingecko.com/api/v3/");
        assert_eq!(adapter.base_url, "https://api.coingecko.com/api/v3");

        let body: SimplePrice = serde_json::from_str(r#"{"bitcoin":{"usd":50123.45}}"#).unwrap();
        let quote = adapter.price_from("bitcoin", &body).unwrap();
        assert_eq!(quote.price, Decimal::from_str("50123.45").unwrap());

        assert!(matches!(adapter.price_from("ethereum", &body), Err(MarketDataError::NotFound(_))));
    }

    #[test]
    fn test_zero_price_is_bad() {
        let adapter = CoinGeckoAdapter::new("http://localhost");
        let body: SimplePrice = serde_json::from_str(r#"{"dust":{"usd":0.0}}"#).unwrap();
        assert!(matches!(adapter.price_from("dust", &body), Err(MarketDataError::BadPrice { .. })));
    }

    #[test]
    fn test_markets_row_deserializes_with_nulls() {
        let row = r#"[{"id":"bitcoin","symbol":"btc","name":"Bitcoin","image":"x.png",
            "current_price":50000,"price_change_percentage_24h":null,"market_cap":1.0e12,"total_volume":null}]"#;
        let assets: Vec<CryptoAsset> = serde_json::from_str(row).unwrap();
        assert_eq!(assets[0].id, "bitcoin");
        assert_eq!(assets[0].current_price, Some(50000.0));
        assert_eq!(assets[0].price_change_percentage_24h, None);
    }
}
