//! Saved list of instruments to keep an eye on.
//!
//! Stored as a JSON file at a path the caller chooses. A missing file means
//! the default list.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::types::{Instrument, InstrumentClass, Quote};
use crate::market_data::adapters::alpha_vantage_types::StockAsset;
use crate::market_data::adapters::coingecko_types::CryptoAsset;
use crate::market_data::adapters::QuoteFeed;
use crate::market_data::router::fetch_many;
use crate::persist::{PersistError, PersistResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistItem {
    /// Id in the class's feed scheme: CoinGecko id, ticker or forex pair.
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub class: InstrumentClass,
}

impl WatchlistItem {
    pub fn new(id: &str, symbol: &str, name: &str, class: InstrumentClass) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            class,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.symbol.to_lowercase().contains(needle)
    }
}

impl From<&CryptoAsset> for WatchlistItem {
    fn from(asset: &CryptoAsset) -> Self {
        Self::new(&asset.id, &asset.symbol.to_uppercase(), &asset.name, InstrumentClass::Crypto)
    }
}

impl From<&StockAsset> for WatchlistItem {
    fn from(stock: &StockAsset) -> Self {
        Self::new(&stock.symbol, &stock.symbol, &stock.name, InstrumentClass::Stock)
    }
}

impl From<&WatchlistItem> for Instrument {
    fn from(item: &WatchlistItem) -> Self {
        Instrument::new(&item.id, &item.symbol, &item.name, item.class)
    }
}

/// Case-insensitive substring match on name or symbol. A blank query finds nothing.
pub fn search(query: &str, candidates: &[WatchlistItem]) -> Vec<WatchlistItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    candidates.iter().filter(|item| item.matches(&needle)).cloned().collect()
}

/// Search results from the crypto market listing followed by stock quotes.
pub fn search_markets(query: &str, cryptos: &[CryptoAsset], stocks: &[StockAsset]) -> Vec<WatchlistItem> {
    let candidates: Vec<WatchlistItem> = cryptos
        .iter()
        .map(WatchlistItem::from)
        .chain(stocks.iter().map(WatchlistItem::from))
        .collect();
    search(query, &candidates)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    items: Vec<WatchlistItem>,
}

impl Default for Watchlist {
    fn default() -> Self {
        Self {
            items: vec![
                WatchlistItem::new("bitcoin", "BTC", "Bitcoin", InstrumentClass::Crypto),
                WatchlistItem::new("ethereum", "ETH", "Ethereum", InstrumentClass::Crypto),
                WatchlistItem::new("AAPL", "AAPL", "Apple Inc", InstrumentClass::Stock),
            ],
        }
    }
}

impl Watchlist {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn items(&self) -> &[WatchlistItem] {
        &self.items
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id.eq_ignore_ascii_case(id))
    }

    /// Newest first. Returns false if the id is already watched.
    pub fn add(&mut self, item: WatchlistItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        debug!(id = %item.id, "Watching");
        self.items.insert(0, item);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<WatchlistItem> {
        let pos = self.items.iter().position(|item| item.id.eq_ignore_ascii_case(id))?;
        Some(self.items.remove(pos))
    }

    pub fn load(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No saved watchlist, using defaults");
            return Ok(Self::default());
        }
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|e| PersistError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PersistResult<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self).map_err(|e| PersistError::Serialization(e.to_string()))
    }

    /// Quote every item through the feed for its class, in list order.
    /// Items whose feed has no price are left out.
    pub async fn quotes<F>(&self, feed_for: F) -> Vec<(WatchlistItem, Quote)>
    where
        F: Fn(InstrumentClass) -> Arc<dyn QuoteFeed>,
    {
        let mut prices: HashMap<(InstrumentClass, String), Quote> = HashMap::new();
        for class in [InstrumentClass::Crypto, InstrumentClass::Stock, InstrumentClass::Forex] {
            let ids: Vec<&str> = self
                .items
                .iter()
                .filter(|item| item.class == class)
                .map(|item| item.id.as_str())
                .collect();
            if ids.is_empty() {
                continue;
            }
            let feed = feed_for(class);
            for (id, quote) in fetch_many(feed.as_ref(), &ids).await {
                prices.insert((class, id), quote);
            }
        }

        self.items
            .iter()
            .filter_map(|item| {
                prices
                    .get(&(item.class, item.id.clone()))
                    .map(|quote| (item.clone(), *quote))
            })
            .collect()
    }
}
