//! Pure conversions from trade history to positions and valuations.
//!
//! This file MUST NOT talk to a store. Ledgers call into it.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::engine::types::Side;
use crate::persist::types::{Holding, Portfolio, PortfolioAsset, TradeRecord};

/// Net quantity of `asset_id` held after replaying `trades`.
pub fn owned_quantity(trades: &[TradeRecord], asset_id: &str) -> Decimal {
    trades
        .iter()
        .filter(|t| t.asset_id == asset_id)
        .map(|t| match t.side {
            Side::Buy => t.quantity,
            Side::Sell => -t.quantity,
        })
        .sum()
}

/// Cash left from `starting_balance` after replaying `trades`.
pub fn cash_balance(starting_balance: Decimal, trades: &[TradeRecord]) -> Decimal {
    trades.iter().fold(starting_balance, |cash, t| match t.side {
        Side::Buy => cash - t.total,
        Side::Sell => cash + t.total,
    })
}

/// Aggregate trades into open positions, one per asset, ordered by asset id.
///
/// Sells release cost basis at the running average buy price, so the average
/// of what is left does not move on a partial sale.
pub fn holdings(trades: &[TradeRecord]) -> Vec<Holding> {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by_key(|t| t.created_at);

    let mut positions: BTreeMap<&str, Holding> = BTreeMap::new();
    for t in ordered {
        let position = positions.entry(t.asset_id.as_str()).or_insert_with(|| Holding {
            asset_id: t.asset_id.clone(),
            symbol: t.symbol.clone(),
            name: t.name.clone(),
            quantity: Decimal::ZERO,
            average_buy_price: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
        });

        match t.side {
            Side::Buy => {
                position.quantity += t.quantity;
                position.cost_basis += t.total;
            }
            Side::Sell => {
                let sold = t.quantity.min(position.quantity);
                position.cost_basis -= position.average_buy_price * sold;
                position.quantity -= sold;
            }
        }

        if position.quantity > Decimal::ZERO {
            position.average_buy_price = position.cost_basis / position.quantity;
        } else {
            position.quantity = Decimal::ZERO;
            position.cost_basis = Decimal::ZERO;
            position.average_buy_price = Decimal::ZERO;
        }
    }

    positions.into_values().filter(|h| h.quantity > Decimal::ZERO).collect()
}

/// Value positions at `prices` (keyed by asset id). A missing price values the
/// position at its average buy price.
pub fn valuation(holdings: Vec<Holding>, prices: &HashMap<String, Decimal>) -> Portfolio {
    let assets: Vec<PortfolioAsset> = holdings
        .into_iter()
        .map(|holding| {
            let current_price = prices.get(&holding.asset_id).copied().unwrap_or(holding.average_buy_price);
            let total_value = holding.quantity * current_price;
            let profit_loss = total_value - holding.cost_basis;
            let profit_loss_percentage = if holding.cost_basis.is_zero() {
                Decimal::ZERO
            } else {
                (profit_loss / holding.cost_basis * Decimal::ONE_HUNDRED).round_dp(2)
            };
            PortfolioAsset {
                holding,
                current_price,
                total_value,
                profit_loss,
                profit_loss_percentage,
            }
        })
        .collect();

    let total_value = assets.iter().map(|a| a.total_value).sum();
    let total_profit = assets.iter().map(|a| a.profit_loss).sum();
    Portfolio { assets, total_value, total_profit }
}
