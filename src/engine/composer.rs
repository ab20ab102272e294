use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::engine::evaluate::{evaluate, max_affordable, quick_quantity};
use crate::engine::types::{
    ComposerError, ComposerResult, DraftEdit, EvaluatedOrder, Instrument, OrderDraft, OrderIntent, OrderType, Quote,
    Side,
};
use crate::persist::{PersistResult, TradeExecutor, TradeRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerState {
    Idle,
    /// An intent is with the executor. `reset_price` is the quote price
    /// captured at submission, used to refill the limit field on success.
    Submitting { intent: OrderIntent, reset_price: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Started(OrderIntent),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Executed(TradeRecord),
    Ignored,
}

/// Order-entry state for one instrument.
///
/// Owns its draft exclusively. Prices and balances are never cached: every
/// call takes the quote and balance the caller has right now.
#[derive(Debug)]
pub struct OrderComposer {
    instrument: Instrument,
    draft: OrderDraft,
    state: ComposerState,
    deferred: Vec<DraftEdit>,
}

impl OrderComposer {
    pub fn new(instrument: Instrument, quote: &Quote) -> Self {
        debug!(asset = %instrument.id, price = %quote.price, "Initialized order composer");
        Self {
            instrument,
            draft: OrderDraft::new(&quote.price.to_string()),
            state: ComposerState::Idle,
            deferred: Vec::new(),
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, ComposerState::Submitting { .. })
    }

    /// Apply an input event. While a submission is in flight the edit is
    /// queued and replayed once it resolves; returns whether it applied now.
    pub fn edit(&mut self, edit: DraftEdit) -> bool {
        if self.is_submitting() {
            debug!(?edit, "Deferring edit until submission resolves");
            self.deferred.push(edit);
            return false;
        }
        edit.apply(&mut self.draft);
        true
    }

    pub fn set_side(&mut self, side: Side) -> bool {
        self.edit(DraftEdit::Side(side))
    }

    pub fn set_order_type(&mut self, order_type: OrderType) -> bool {
        self.edit(DraftEdit::OrderType(order_type))
    }

    pub fn set_quantity(&mut self, text: &str) -> bool {
        self.edit(DraftEdit::Quantity(text.to_string()))
    }

    pub fn set_limit_price(&mut self, text: &str) -> bool {
        self.edit(DraftEdit::LimitPrice(text.to_string()))
    }

    pub fn evaluate(&self, quote: &Quote, available_balance: Decimal) -> EvaluatedOrder {
        evaluate(&self.draft, quote.price, available_balance)
    }

    /// Slider shortcut: size the draft at `percent` of what can be bought
    /// (BUY) or of `owned_quantity` (SELL).
    pub fn quick_select(
        &mut self,
        percent: Decimal,
        quote: &Quote,
        available_balance: Decimal,
        owned_quantity: Option<Decimal>,
    ) -> Decimal {
        let quantity = quick_quantity(
            self.draft.side,
            percent,
            quote.price,
            available_balance,
            owned_quantity,
            self.instrument.class,
        );
        let text = self.format_quantity(quantity);
        self.set_quantity(&text);
        quantity
    }

    /// "Max" shortcut: the whole balance at the current quote.
    pub fn fill_max(&mut self, quote: &Quote, available_balance: Decimal) -> Decimal {
        let quantity = quick_quantity(
            Side::Buy,
            Decimal::ONE_HUNDRED,
            quote.price,
            available_balance,
            None,
            self.instrument.class,
        );
        let text = self.format_quantity(quantity);
        self.set_quantity(&text);
        quantity
    }

    pub fn max_affordable(&self, quote: &Quote, available_balance: Decimal) -> Decimal {
        max_affordable(quote.price, available_balance)
    }

    fn format_quantity(&self, quantity: Decimal) -> String {
        format!("{:.prec$}", quantity, prec = self.instrument.class.quantity_precision() as usize)
    }

    /// First half of a submit: validate against `quote` and enter
    /// `Submitting`. A request while already submitting is ignored.
    pub fn begin_submit(&mut self, quote: &Quote, available_balance: Decimal) -> ComposerResult<Submission> {
        if self.is_submitting() {
            debug!(asset = %self.instrument.id, "Submission already in flight, ignoring");
            return Ok(Submission::Ignored);
        }

        let eval = self.evaluate(quote, available_balance);
        if let Some(rejection) = eval.rejection() {
            let error = ComposerError::from(rejection);
            warn!(asset = %self.instrument.id, error = %error, "Blocking submission");
            metrics::counter!("papertrade_orders_blocked_total", "side" => eval.side.as_str()).increment(1);
            return Err(error);
        }

        let intent = OrderIntent {
            instrument: self.instrument.clone(),
            side: eval.side,
            order_type: eval.order_type,
            quantity: eval.quantity,
            price: eval.effective_price,
            notional_total: eval.notional_total,
        };
        debug!(
            asset = %intent.instrument.id,
            side = ?intent.side,
            qty = %intent.quantity,
            price = %intent.price,
            total = %intent.notional_total,
            "Submitting order intent"
        );
        self.state = ComposerState::Submitting { intent: intent.clone(), reset_price: quote.price };
        Ok(Submission::Started(intent))
    }

    /// Second half of a submit. Success clears the quantity and refills the
    /// limit price; failure keeps the draft for a manual retry. Deferred
    /// edits are replayed either way.
    pub fn complete_submit(&mut self, outcome: PersistResult<TradeRecord>) -> ComposerResult<TradeRecord> {
        let reset_price = match std::mem::replace(&mut self.state, ComposerState::Idle) {
            ComposerState::Submitting { reset_price, .. } => reset_price,
            ComposerState::Idle => return Err(ComposerError::NotSubmitting),
        };

        let result = match outcome {
            Ok(record) => {
                info!(
                    id = %record.id,
                    symbol = %record.symbol,
                    side = ?record.side,
                    qty = %record.quantity,
                    price = %record.price,
                    "Order executed"
                );
                metrics::counter!("papertrade_orders_submitted_total", "side" => record.side.as_str()).increment(1);
                self.draft.quantity.clear();
                self.draft.limit_price = reset_price.to_string();
                Ok(record)
            }
            Err(e) => {
                warn!(asset = %self.instrument.id, error = %e, "Order execution failed, draft preserved");
                metrics::counter!("papertrade_orders_failed_total").increment(1);
                Err(ComposerError::ExecutionFailed(e.to_string()))
            }
        };

        for edit in std::mem::take(&mut self.deferred) {
            edit.apply(&mut self.draft);
        }
        result
    }

    #[instrument(skip(self, executor, quote), fields(asset = %self.instrument.id))]
    pub async fn submit<E>(&mut self, executor: &E, quote: &Quote, available_balance: Decimal) -> ComposerResult<SubmitOutcome>
    where
        E: TradeExecutor + ?Sized,
    {
        let intent = match self.begin_submit(quote, available_balance)? {
            Submission::Started(intent) => intent,
            Submission::Ignored => return Ok(SubmitOutcome::Ignored),
        };
        let outcome = executor.execute(&intent).await;
        self.complete_submit(outcome).map(SubmitOutcome::Executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::InstrumentClass;
    use crate::persist::PersistError;
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn btc() -> Instrument {
        Instrument::new("bitcoin", "BTC", "Bitcoin", InstrumentClass::Crypto)
    }

    fn record_for(intent: &OrderIntent) -> TradeRecord {
        TradeRecord {
            id: "abc1234".to_string(),
            user_id: "123".to_string(),
            asset_id: intent.instrument.id.clone(),
            symbol: intent.instrument.symbol.clone(),
            name: intent.instrument.name.clone(),
            side: intent.side,
            order_type: intent.order_type,
            quantity: intent.quantity,
            price: intent.price,
            total: intent.notional_total,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_initialise() {
        let quote = Quote::new(dec("50000"));
        let composer = OrderComposer::new(btc(), &quote);
        assert_eq!(composer.state(), &ComposerState::Idle);
        assert_eq!(composer.draft().quantity, "");
        assert_eq!(composer.draft().limit_price, "50000");
        assert_eq!(composer.draft().side, Side::Buy);
        assert_eq!(composer.draft().order_type, OrderType::Market);
    }

    #[test]
    fn test_begin_submit_builds_intent() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("0.1");
        let submission = composer.begin_submit(&quote, dec("10000")).unwrap();
        let Submission::Started(intent) = submission else {
            panic!("Expected submission to start");
        };
        assert_eq!(intent.quantity, dec("0.1"));
        assert_eq!(intent.price, dec("50000"));
        assert_eq!(intent.notional_total, dec("5000"));
        assert!(composer.is_submitting());
    }

    #[test]
    fn test_second_submit_is_ignored() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("0.1");
        assert!(matches!(composer.begin_submit(&quote, dec("10000")), Ok(Submission::Started(_))));
        assert_eq!(composer.begin_submit(&quote, dec("10000")), Ok(Submission::Ignored));
    }

    #[test]
    fn test_insufficient_funds_blocks() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("0.5");
        let err = composer.begin_submit(&quote, dec("10000")).unwrap_err();
        assert_eq!(err, ComposerError::InsufficientFunds { total: dec("25000"), available: dec("10000") });
        assert!(!composer.is_submitting());
    }

    #[test]
    fn test_zero_quantity_blocks() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("abc");
        assert_eq!(composer.begin_submit(&quote, dec("10000")), Err(ComposerError::ZeroQuantity));
    }

    #[test]
    fn test_success_resets_draft() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_order_type(OrderType::Limit);
        composer.set_limit_price("49000");
        composer.set_quantity("0.1");

        let later = Quote::new(dec("51000"));
        let Ok(Submission::Started(intent)) = composer.begin_submit(&later, dec("10000")) else {
            panic!("Expected submission to start");
        };
        assert_eq!(intent.price, dec("49000"));

        let record = composer.complete_submit(Ok(record_for(&intent))).unwrap();
        assert_eq!(record.total, dec("4900"));
        assert_eq!(composer.draft().quantity, "");
        assert_eq!(composer.draft().limit_price, "51000");
        assert_eq!(composer.draft().order_type, OrderType::Limit);
        assert_eq!(composer.state(), &ComposerState::Idle);
    }

    #[test]
    fn test_failure_preserves_draft() {
        let quote = Quote::new(dec("100"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("2");
        let before = composer.draft().clone();
        composer.begin_submit(&quote, dec("1000")).unwrap();

        let err = composer
            .complete_submit(Err(PersistError::Other("backend unavailable".to_string())))
            .unwrap_err();
        assert_eq!(err, ComposerError::ExecutionFailed("backend unavailable".to_string()));
        assert_eq!(composer.draft(), &before);
        assert!(!composer.is_submitting());
    }

    #[test]
    fn test_edits_deferred_while_submitting() {
        let quote = Quote::new(dec("100"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_quantity("2");
        let Ok(Submission::Started(intent)) = composer.begin_submit(&quote, dec("1000")) else {
            panic!("Expected submission to start");
        };

        assert!(!composer.set_quantity("5"));
        assert!(!composer.set_side(Side::Sell));
        assert_eq!(composer.draft().quantity, "2");
        assert_eq!(composer.draft().side, Side::Buy);

        composer.complete_submit(Ok(record_for(&intent))).unwrap();
        assert_eq!(composer.draft().quantity, "5");
        assert_eq!(composer.draft().side, Side::Sell);
    }

    #[test]
    fn test_deferred_edits_replay_onto_preserved_draft() {
        let quote = Quote::new(dec("100"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_order_type(OrderType::Limit);
        composer.set_limit_price("95");
        composer.set_quantity("2");
        composer.begin_submit(&quote, dec("1000")).unwrap();

        assert!(!composer.set_quantity("3"));
        assert!(!composer.set_limit_price("90"));

        let err = composer
            .complete_submit(Err(PersistError::Other("backend unavailable".to_string())))
            .unwrap_err();
        assert_eq!(err, ComposerError::ExecutionFailed("backend unavailable".to_string()));
        // Failure keeps the draft, then the queued edits land on top of it
        assert_eq!(composer.draft().quantity, "3");
        assert_eq!(composer.draft().limit_price, "90");
        assert_eq!(composer.draft().order_type, OrderType::Limit);
        assert!(!composer.is_submitting());

        let eval = composer.evaluate(&quote, dec("1000"));
        assert_eq!(eval.notional_total, dec("270"));
    }

    #[test]
    fn test_out_of_range_quantity_blocks() {
        let quote = Quote::new(dec("2"));
        let mut composer = OrderComposer::new(btc(), &quote);
        composer.set_side(Side::Sell);
        composer.set_quantity("79228162514264337593543950335");
        assert_eq!(composer.begin_submit(&quote, Decimal::ZERO), Err(ComposerError::ExceedsLimit));
        assert!(!composer.is_submitting());
    }

    #[test]
    fn test_complete_without_submit() {
        let quote = Quote::new(dec("100"));
        let mut composer = OrderComposer::new(btc(), &quote);
        let err = composer.complete_submit(Err(PersistError::Other("x".to_string()))).unwrap_err();
        assert_eq!(err, ComposerError::NotSubmitting);
    }

    #[test]
    fn test_quick_select_formats_to_precision() {
        let quote = Quote::new(dec("50000"));
        let mut composer = OrderComposer::new(btc(), &quote);
        let qty = composer.quick_select(dec("50"), &quote, dec("10000"), None);
        assert_eq!(qty, dec("0.1"));
        assert_eq!(composer.draft().quantity, "0.100000");

        composer.set_side(Side::Sell);
        composer.quick_select(dec("100"), &quote, dec("10000"), None);
        assert_eq!(composer.draft().quantity, "0.000000");
    }

    #[test]
    fn test_fill_max_for_stock() {
        let aapl = Instrument::new("AAPL", "AAPL", "Apple Inc", InstrumentClass::Stock);
        let quote = Quote::new(dec("175"));
        let mut composer = OrderComposer::new(aapl, &quote);
        composer.fill_max(&quote, dec("1000"));
        assert_eq!(composer.draft().quantity, "5.71");
        assert!(composer.evaluate(&quote, dec("1000")).can_submit());
    }
}
