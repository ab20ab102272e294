use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::engine::types::{OrderIntent, Side};
use crate::persist::portfolio;
use crate::persist::types::{PersistError, PersistResult, TradeRecord};
use crate::persist::{HoldingsProvider, TradeExecutor};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 7;

#[derive(Debug)]
struct LedgerState {
    cash: Decimal,
    trades: Vec<TradeRecord>,
}

/// In-memory simulated account: a cash balance and the trades booked
/// against it. Shareable behind an `Arc`.
#[derive(Debug)]
pub struct PaperLedger {
    user_id: String,
    state: Mutex<LedgerState>,
}

impl PaperLedger {
    pub fn new(user_id: &str, starting_balance: Decimal) -> Self {
        Self::with_history(user_id, starting_balance, Vec::new())
    }

    /// Ledger whose cash already reflects `trades`.
    pub fn with_history(user_id: &str, starting_balance: Decimal, trades: Vec<TradeRecord>) -> Self {
        let cash = portfolio::cash_balance(starting_balance, &trades);
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(LedgerState { cash, trades }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

fn trade_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

#[async_trait]
impl TradeExecutor for PaperLedger {
    #[instrument(skip(self, intent), fields(asset = %intent.instrument.id, side = ?intent.side))]
    async fn execute(&self, intent: &OrderIntent) -> PersistResult<TradeRecord> {
        let mut state = self.state.lock();

        match intent.side {
            Side::Buy if intent.notional_total > state.cash => {
                warn!(total = %intent.notional_total, cash = %state.cash, "Rejecting unfunded buy");
                return Err(PersistError::InsufficientFunds {
                    needed: intent.notional_total,
                    available: state.cash,
                });
            }
            Side::Sell => {
                let owned = portfolio::owned_quantity(&state.trades, &intent.instrument.id);
                if intent.quantity > owned {
                    warn!(qty = %intent.quantity, owned = %owned, "Rejecting sell beyond holdings");
                    return Err(PersistError::InsufficientHoldings {
                        asset_id: intent.instrument.id.clone(),
                        needed: intent.quantity,
                        owned,
                    });
                }
            }
            Side::Buy => {}
        }

        let record = TradeRecord {
            id: trade_id(),
            user_id: self.user_id.clone(),
            asset_id: intent.instrument.id.clone(),
            symbol: intent.instrument.symbol.clone(),
            name: intent.instrument.name.clone(),
            side: intent.side,
            order_type: intent.order_type,
            quantity: intent.quantity,
            price: intent.price,
            total: intent.notional_total,
            created_at: Utc::now(),
        };

        match record.side {
            Side::Buy => state.cash -= record.total,
            Side::Sell => state.cash += record.total,
        }
        state.trades.push(record.clone());
        debug!(id = %record.id, cash = %state.cash, "Booked paper trade");
        Ok(record)
    }
}

#[async_trait]
impl HoldingsProvider for PaperLedger {
    async fn available_balance(&self) -> PersistResult<Decimal> {
        Ok(self.state.lock().cash)
    }

    async fn owned_quantity(&self, asset_id: &str) -> PersistResult<Decimal> {
        Ok(portfolio::owned_quantity(&self.state.lock().trades, asset_id))
    }

    async fn trades(&self) -> PersistResult<Vec<TradeRecord>> {
        Ok(self.state.lock().trades.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Instrument, InstrumentClass, OrderType};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn intent(side: Side, qty: &str, price: &str) -> OrderIntent {
        let quantity = dec(qty);
        let price = dec(price);
        OrderIntent {
            instrument: Instrument::new("bitcoin", "BTC", "Bitcoin", InstrumentClass::Crypto),
            side,
            order_type: OrderType::Market,
            quantity,
            price,
            notional_total: quantity * price,
        }
    }

    #[test]
    fn test_trade_id_shape() {
        let id = trade_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn test_buy_then_sell() {
        let ledger = PaperLedger::new("123", dec("100000"));
        let bought = ledger.execute(&intent(Side::Buy, "0.5", "50000")).await.unwrap();
        assert_eq!(bought.total, dec("25000"));
        assert_eq!(bought.user_id, "123");
        assert_eq!(ledger.available_balance().await.unwrap(), dec("75000"));
        assert_eq!(ledger.owned_quantity("bitcoin").await.unwrap(), dec("0.5"));

        ledger.execute(&intent(Side::Sell, "0.2", "55000")).await.unwrap();
        assert_eq!(ledger.available_balance().await.unwrap(), dec("86000"));
        assert_eq!(ledger.owned_quantity("bitcoin").await.unwrap(), dec("0.3"));
        assert_eq!(ledger.trades().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unfunded_buy_rejected() {
        let ledger = PaperLedger::new("123", dec("1000"));
        let err = ledger.execute(&intent(Side::Buy, "1", "50000")).await.unwrap_err();
        assert!(matches!(err, PersistError::InsufficientFunds { .. }));
        assert!(ledger.trades().await.unwrap().is_empty());
        assert_eq!(ledger.available_balance().await.unwrap(), dec("1000"));
    }

    #[tokio::test]
    async fn test_oversell_rejected() {
        let ledger = PaperLedger::new("123", dec("1000"));
        let err = ledger.execute(&intent(Side::Sell, "1", "50000")).await.unwrap_err();
        assert!(matches!(err, PersistError::InsufficientHoldings { .. }));
    }
}
