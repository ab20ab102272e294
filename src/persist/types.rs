use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::types::{OrderType, Side};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("insufficient holdings of {asset_id}: need {needed}, have {owned}")]
    InsufficientHoldings { asset_id: String, needed: Decimal, owned: Decimal },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// A confirmed paper trade. Mirrors a row of the `trades` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub user_id: String,
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

// Per-asset position aggregated from trade history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holding {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
    pub cost_basis: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioAsset {
    pub holding: Holding,
    pub current_price: Decimal,
    pub total_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Portfolio {
    pub assets: Vec<PortfolioAsset>,
    pub total_value: Decimal,
    pub total_profit: Decimal,
}
