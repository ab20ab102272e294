// Source: https://api.coingecko.com/api/v3 (/simple/price, /coins/markets)
use std::collections::HashMap;

/// `/simple/price?ids=bitcoin&vs_currencies=usd` -> `{"bitcoin": {"usd": 50000.0}}`
pub type SimplePrice = HashMap<String, HashMap<String, f64>>;

// One row of /coins/markets
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CryptoAsset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
}
