pub mod types;
pub use types::*;
pub mod export;
pub mod paper;
pub mod portfolio;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::engine::types::OrderIntent;

/// Execution side of a submit. All-or-nothing: either a record comes back
/// or nothing was booked.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, intent: &OrderIntent) -> PersistResult<TradeRecord>;
}

/// Cash and inventory figures the composer sizes orders against.
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    async fn available_balance(&self) -> PersistResult<Decimal>;
    async fn owned_quantity(&self, asset_id: &str) -> PersistResult<Decimal>;
    async fn trades(&self) -> PersistResult<Vec<TradeRecord>>;
}

/// A store that both books trades and reports the resulting account.
pub trait Ledger: TradeExecutor + HoldingsProvider {}

impl<T: TradeExecutor + HoldingsProvider> Ledger for T {}
