//! Pure pricing and validation of an [`OrderDraft`].
//!
//! Nothing here touches state: the caller re-runs [`evaluate`] on every edit
//! and on every quote change.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::trace;

use crate::engine::types::{EvaluatedOrder, InstrumentClass, OrderDraft, OrderType, Side};

/// Parse user text as a non-negative decimal.
///
/// Empty, unparsable and negative input yield `None`; callers pick the default.
pub fn parse_non_negative(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()?;
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    Some(value)
}

/// Input that reads as a positive number at least 1 but does not fit a
/// `Decimal` (e.g. `"1e30"`). [`parse_non_negative`] returns `None` for it.
pub fn exceeds_decimal_range(text: &str) -> bool {
    let trimmed = text.trim();
    parse_non_negative(trimmed).is_none()
        && trimmed
            .parse::<f64>()
            .map(|v| v.is_finite() && v >= 1.0)
            .unwrap_or(false)
}

pub fn evaluate(draft: &OrderDraft, current_price: Decimal, available_balance: Decimal) -> EvaluatedOrder {
    let quantity = parse_non_negative(&draft.quantity).unwrap_or(Decimal::ZERO);

    let effective_price = match draft.order_type {
        OrderType::Market => current_price,
        // A blank or zero limit field would zero the total; use the quote instead
        OrderType::Limit => parse_non_negative(&draft.limit_price)
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or(current_price),
    };

    let limit_out_of_range = draft.order_type == OrderType::Limit && exceeds_decimal_range(&draft.limit_price);
    let checked_total = quantity.checked_mul(effective_price);
    let is_within_limits = checked_total.is_some() && !limit_out_of_range && !exceeds_decimal_range(&draft.quantity);
    // Out-of-range drafts carry no total; they are blocked before any funds check
    let notional_total = checked_total.unwrap_or(Decimal::ZERO);
    let is_affordable = match draft.side {
        Side::Sell => true,
        Side::Buy => notional_total <= available_balance,
    };

    trace!(
        side = ?draft.side,
        order_type = ?draft.order_type,
        %quantity,
        %effective_price,
        %notional_total,
        is_affordable,
        is_within_limits,
        "Evaluated draft"
    );

    EvaluatedOrder {
        side: draft.side,
        order_type: draft.order_type,
        quantity,
        effective_price,
        notional_total,
        available_balance,
        is_affordable,
        is_positive_quantity: quantity > Decimal::ZERO,
        is_within_limits,
    }
}

/// Quantity for a quick-select percentage.
///
/// BUY sizes against cash, SELL against the owned quantity; an unknown
/// holding sells nothing. Truncated so a 100% BUY stays affordable.
pub fn quick_quantity(
    side: Side,
    percent: Decimal,
    current_price: Decimal,
    available_balance: Decimal,
    owned_quantity: Option<Decimal>,
    class: InstrumentClass,
) -> Decimal {
    let fraction = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED;
    let max = match side {
        Side::Buy => max_affordable(current_price, available_balance),
        Side::Sell => owned_quantity.unwrap_or(Decimal::ZERO).max(Decimal::ZERO),
    };
    let raw = max.checked_mul(fraction).unwrap_or(Decimal::ZERO);
    raw.round_dp_with_strategy(class.quantity_precision(), RoundingStrategy::ToZero)
}

/// Unrounded number of units the balance can buy at `current_price`.
pub fn max_affordable(current_price: Decimal, available_balance: Decimal) -> Decimal {
    if current_price <= Decimal::ZERO || available_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    available_balance.checked_div(current_price).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Rejection;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn draft(side: Side, order_type: OrderType, qty: &str, limit: &str) -> OrderDraft {
        OrderDraft {
            side,
            order_type,
            quantity: qty.to_string(),
            limit_price: limit.to_string(),
        }
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(parse_non_negative("0.1"), Some(dec("0.1")));
        assert_eq!(parse_non_negative("  42 "), Some(dec("42")));
        assert_eq!(parse_non_negative("1e3"), Some(dec("1000")));
        assert_eq!(parse_non_negative(""), None);
        assert_eq!(parse_non_negative("abc"), None);
        assert_eq!(parse_non_negative("-3"), None);
        assert_eq!(parse_non_negative("0"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_exceeds_decimal_range() {
        assert!(exceeds_decimal_range("1e30"));
        assert!(exceeds_decimal_range(" 99999999999999999999999999999999 "));
        assert!(!exceeds_decimal_range("1e3"));
        assert!(!exceeds_decimal_range("abc"));
        assert!(!exceeds_decimal_range("inf"));
        assert!(!exceeds_decimal_range("-1e30"));
    }

    #[test]
    fn test_overflowing_total_is_blocked() {
        let d = draft(Side::Sell, OrderType::Market, "79228162514264337593543950335", "");
        let eval = evaluate(&d, dec("2"), Decimal::ZERO);
        assert!(!eval.is_within_limits);
        assert!(!eval.can_submit());
        assert_eq!(eval.notional_total, Decimal::ZERO);
        assert_eq!(eval.rejection(), Some(Rejection::ExceedsLimit));
    }

    #[test]
    fn test_out_of_range_quantity_is_not_zero_quantity() {
        for qty in ["1e30", "99999999999999999999999999999999"] {
            let d = draft(Side::Buy, OrderType::Market, qty, "");
            let eval = evaluate(&d, dec("100"), dec("1000"));
            assert_eq!(eval.rejection(), Some(Rejection::ExceedsLimit), "quantity text {:?}", qty);
        }
    }

    #[test]
    fn test_out_of_range_limit_price_is_blocked() {
        let d = draft(Side::Buy, OrderType::Limit, "1", "1e40");
        let eval = evaluate(&d, dec("100"), dec("1000"));
        assert_eq!(eval.rejection(), Some(Rejection::ExceedsLimit));
        // The same text is ignored for market orders
        let d = draft(Side::Buy, OrderType::Market, "1", "1e40");
        assert!(evaluate(&d, dec("100"), dec("1000")).can_submit());
    }

    #[test]
    fn test_market_buy_within_balance() {
        let d = draft(Side::Buy, OrderType::Market, "0.1", "");
        let eval = evaluate(&d, dec("50000"), dec("10000"));
        assert_eq!(eval.notional_total, dec("5000"));
        assert!(eval.can_submit());
        assert_eq!(eval.rejection(), None);
    }

    #[test]
    fn test_market_buy_over_balance() {
        let d = draft(Side::Buy, OrderType::Market, "0.5", "");
        let eval = evaluate(&d, dec("50000"), dec("10000"));
        assert_eq!(eval.notional_total, dec("25000"));
        assert!(!eval.can_submit());
        assert_eq!(
            eval.rejection(),
            Some(Rejection::InsufficientFunds { total: dec("25000"), available: dec("10000") })
        );
    }

    #[test]
    fn test_empty_quantity_is_zero() {
        let d = draft(Side::Buy, OrderType::Market, "", "");
        let eval = evaluate(&d, dec("100"), dec("1000"));
        assert_eq!(eval.quantity, Decimal::ZERO);
        assert_eq!(eval.rejection(), Some(Rejection::ZeroQuantity));
    }

    #[test]
    fn test_limit_uses_limit_price() {
        let d = draft(Side::Buy, OrderType::Limit, "2", "90");
        let eval = evaluate(&d, dec("100"), dec("1000"));
        assert_eq!(eval.effective_price, dec("90"));
        assert_eq!(eval.notional_total, dec("180"));
    }

    #[test]
    fn test_limit_blank_falls_back_to_quote() {
        for limit in ["", "x", "0", "-5"] {
            let d = draft(Side::Buy, OrderType::Limit, "2", limit);
            let eval = evaluate(&d, dec("100"), dec("1000"));
            assert_eq!(eval.effective_price, dec("100"), "limit text {:?}", limit);
        }
    }

    #[test]
    fn test_market_ignores_limit_price() {
        let d = draft(Side::Buy, OrderType::Market, "1", "5");
        let eval = evaluate(&d, dec("100"), dec("1000"));
        assert_eq!(eval.effective_price, dec("100"));
    }

    #[test]
    fn test_sell_skips_affordability() {
        let d = draft(Side::Sell, OrderType::Market, "10", "");
        let eval = evaluate(&d, dec("50000"), Decimal::ZERO);
        assert!(eval.is_affordable);
        assert!(eval.can_submit());
    }

    #[test]
    fn test_quick_quantity_buy() {
        let q = quick_quantity(Side::Buy, dec("100"), dec("50000"), dec("10000"), None, InstrumentClass::Crypto);
        assert_eq!(q, dec("0.2"));
        let q = quick_quantity(Side::Buy, dec("50"), dec("3"), dec("2"), None, InstrumentClass::Crypto);
        assert_eq!(q, dec("0.333333"));
    }

    #[test]
    fn test_quick_quantity_truncates_for_stocks() {
        let q = quick_quantity(Side::Buy, dec("100"), dec("3"), dec("2"), None, InstrumentClass::Stock);
        assert_eq!(q, dec("0.66"));
    }

    #[test]
    fn test_quick_quantity_sell_without_holdings() {
        let q = quick_quantity(Side::Sell, dec("100"), dec("100"), dec("1000"), None, InstrumentClass::Stock);
        assert_eq!(q, Decimal::ZERO);
        let q = quick_quantity(Side::Sell, dec("25"), dec("100"), dec("1000"), Some(dec("10")), InstrumentClass::Stock);
        assert_eq!(q, dec("2.5"));
    }

    #[test]
    fn test_quick_quantity_clamps_percent() {
        let over = quick_quantity(Side::Buy, dec("150"), dec("10"), dec("100"), None, InstrumentClass::Stock);
        assert_eq!(over, dec("10"));
        let under = quick_quantity(Side::Buy, dec("-5"), dec("10"), dec("100"), None, InstrumentClass::Stock);
        assert_eq!(under, Decimal::ZERO);
    }

    #[test]
    fn test_max_affordable_zero_price() {
        assert_eq!(max_affordable(Decimal::ZERO, dec("100")), Decimal::ZERO);
    }
}
