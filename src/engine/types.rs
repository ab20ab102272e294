use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

/// Asset class of an instrument. Decides how finely quantities are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    Crypto,
    Stock,
    Forex,
}

impl InstrumentClass {
    /// Decimal places used when deriving a quantity (slider, max button).
    pub fn quantity_precision(&self) -> u32 {
        match self {
            InstrumentClass::Crypto => 6,
            InstrumentClass::Stock | InstrumentClass::Forex => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub class: InstrumentClass,
}

impl Instrument {
    pub fn new(id: &str, symbol: &str, name: &str, class: InstrumentClass) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            class,
        }
    }
}

// Live price as supplied by a quote feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub as_of: DateTime<Utc>,
}

impl Quote {
    pub fn new(price: Decimal) -> Self {
        Self { price, as_of: Utc::now() }
    }
}

/// In-progress order as the user typed it.
///
/// Numeric fields stay raw text so a half-typed value ("0.", "") survives
/// between evaluations. Parsed values live only in [`EvaluatedOrder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: String,
    pub limit_price: String,
}

impl OrderDraft {
    pub fn new(limit_price: &str) -> Self {
        Self {
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: String::new(),
            limit_price: limit_price.to_string(),
        }
    }
}

/// A single change to a draft, as produced by one input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEdit {
    Side(Side),
    OrderType(OrderType),
    Quantity(String),
    LimitPrice(String),
}

impl DraftEdit {
    pub fn apply(self, draft: &mut OrderDraft) {
        match self {
            DraftEdit::Side(side) => draft.side = side,
            DraftEdit::OrderType(order_type) => draft.order_type = order_type,
            DraftEdit::Quantity(text) => draft.quantity = text,
            DraftEdit::LimitPrice(text) => draft.limit_price = text,
        }
    }
}

/// Why a draft cannot be submitted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Quantity, limit price or their product does not fit a `Decimal`.
    ExceedsLimit,
    ZeroQuantity,
    InsufficientFunds { total: Decimal, available: Decimal },
}

// Derived view of a draft; rebuilt on every evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatedOrder {
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub effective_price: Decimal,
    pub notional_total: Decimal,
    pub available_balance: Decimal,
    pub is_affordable: bool,
    pub is_positive_quantity: bool,
    pub is_within_limits: bool,
}

impl EvaluatedOrder {
    pub fn can_submit(&self) -> bool {
        self.is_within_limits && self.is_positive_quantity && self.is_affordable
    }

    pub fn rejection(&self) -> Option<Rejection> {
        if !self.is_within_limits {
            Some(Rejection::ExceedsLimit)
        } else if !self.is_positive_quantity {
            Some(Rejection::ZeroQuantity)
        } else if !self.is_affordable {
            Some(Rejection::InsufficientFunds {
                total: self.notional_total,
                available: self.available_balance,
            })
        } else {
            None
        }
    }
}

/// Finalized order handed to the execution side. Built once per submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub instrument: Instrument,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub notional_total: Decimal,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComposerError {
    #[error("order amount is outside the supported range")]
    ExceedsLimit,
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    #[error("insufficient balance: order total {total} exceeds available {available}")]
    InsufficientFunds { total: Decimal, available: Decimal },
    #[error("no submission in flight")]
    NotSubmitting,
    #[error("trade execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<Rejection> for ComposerError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::ExceedsLimit => ComposerError::ExceedsLimit,
            Rejection::ZeroQuantity => ComposerError::ZeroQuantity,
            Rejection::InsufficientFunds { total, available } => {
                ComposerError::InsufficientFunds { total, available }
            }
        }
    }
}

pub type ComposerResult<T> = Result<T, ComposerError>;
