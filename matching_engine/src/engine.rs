use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::error::EngineError;
use crate::order::{NewOrder, Order, OrderId, OrderStatus, Price, Quantity, Side, Trade};

/// Owns the order book and the order-id sequence. All operations run to
/// completion on the calling thread; a submit that crosses has executed
/// every resulting trade before it returns. Callers that share an engine
/// across threads serialize through one exclusive lock.
pub struct MatchingEngine {
    book: OrderBook,
    order_counter: u64,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            book: OrderBook::new(),
            order_counter: 0,
        }
    }

    /// Validates, matches and (if a residual is left) rests a limit order.
    /// Returns the assigned id whether the order filled or rested.
    pub fn submit(
        &mut self,
        side: Side,
        price: Price,
        quantity: Quantity,
        symbol: &str,
        client_id: &str,
    ) -> Result<OrderId, EngineError> {
        if price <= Decimal::ZERO || quantity == 0 {
            return Err(EngineError::InvalidOrder { price, quantity });
        }

        let order_id = self.next_order_id();
        let order = Order::new(order_id.clone(), side, price, quantity, symbol, client_id);
        self.match_and_rest(order)?;
        Ok(order_id)
    }

    pub fn submit_order(&mut self, order: NewOrder) -> Result<OrderId, EngineError> {
        self.submit(
            order.side,
            order.price,
            order.quantity,
            &order.symbol,
            &order.client_id,
        )
    }

    /// Submits sequentially; position within the batch is arrival order.
    pub fn submit_batch(
        &mut self,
        orders: impl IntoIterator<Item = NewOrder>,
    ) -> Vec<Result<OrderId, EngineError>> {
        orders
            .into_iter()
            .map(|order| self.submit_order(order))
            .collect()
    }

    /// True iff an open order with this id existed. Idempotent: a second
    /// cancel of the same id returns false.
    pub fn cancel(&mut self, order_id: &str) -> bool {
        self.book.cancel(order_id).is_some()
    }

    /// Cancel-and-resubmit under the same id, allowed only while the order
    /// has no fills. The replacement re-enters matching and joins the back
    /// of its price queue, losing time priority.
    pub fn modify(&mut self, order_id: &str, new_price: Price, new_quantity: Quantity) -> bool {
        self.try_modify(order_id, new_price, new_quantity).is_ok()
    }

    pub fn try_modify(
        &mut self,
        order_id: &str,
        new_price: Price,
        new_quantity: Quantity,
    ) -> Result<(), EngineError> {
        if new_price <= Decimal::ZERO || new_quantity == 0 {
            return Err(EngineError::InvalidOrder {
                price: new_price,
                quantity: new_quantity,
            });
        }
        let order = self
            .book
            .get(order_id)
            .ok_or_else(|| EngineError::UnknownOrder(order_id.to_string()))?;
        if order.status != OrderStatus::Pending {
            return Err(EngineError::NotModifiable(order_id.to_string()));
        }

        let side = order.side;
        let symbol = order.symbol.clone();
        let client_id = order.client_id.clone();

        self.book.cancel(order_id);
        let replacement = Order::new(
            order_id.to_string(),
            side,
            new_price,
            new_quantity,
            symbol,
            client_id,
        );
        self.match_and_rest(replacement)
    }

    /// Read-only view of an open order; terminal orders are gone.
    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.book.get(order_id)
    }

    pub fn best_bid(&self) -> Price {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Price {
        self.book.best_ask()
    }

    pub fn bid_size(&self) -> Quantity {
        self.book.bid_size()
    }

    pub fn ask_size(&self) -> Quantity {
        self.book.ask_size()
    }

    pub fn spread(&self) -> Price {
        self.book.spread()
    }

    pub fn bid_depth(&self, levels: usize) -> Vec<(Price, Quantity)> {
        self.book.bid_depth(levels)
    }

    pub fn ask_depth(&self, levels: usize) -> Vec<(Price, Quantity)> {
        self.book.ask_depth(levels)
    }

    pub fn open_order_count(&self) -> usize {
        self.book.open_order_count()
    }

    /// Ids issued over the engine's lifetime, including fully-filled and
    /// cancelled orders.
    pub fn total_orders(&self) -> u64 {
        self.order_counter
    }

    pub fn set_trade_listener(&mut self, listener: impl FnMut(Trade) + Send + 'static) {
        self.book.set_trade_listener(listener);
    }

    fn next_order_id(&mut self) -> OrderId {
        self.order_counter += 1;
        format!("O{}", self.order_counter)
    }

    fn match_and_rest(&mut self, mut incoming: Order) -> Result<(), EngineError> {
        self.match_incoming(&mut incoming);
        if incoming.remaining() > 0 {
            self.book.add(incoming)?;
        }
        Ok(())
    }

    /// The match loop: while the incoming order crosses the best opposite
    /// level, trade against the oldest resting order there at its limit
    /// price. The incoming order is not indexed while it matches.
    fn match_incoming(&mut self, incoming: &mut Order) {
        while incoming.remaining() > 0 {
            let Some((best_price, maker_id)) =
                self.book.front_of_best_level(incoming.side.opposite())
            else {
                break;
            };

            let crosses = match incoming.side {
                Side::Buy => best_price <= incoming.limit_price,
                Side::Sell => best_price >= incoming.limit_price,
            };
            if !crosses {
                break;
            }

            let Some(maker_remaining) = self.book.get(&maker_id).map(Order::remaining) else {
                break;
            };
            let quantity = incoming.remaining().min(maker_remaining);
            self.book.execute_trade(incoming, &maker_id, quantity);
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn engine_with_log() -> (MatchingEngine, Arc<Mutex<Vec<Trade>>>) {
        let mut engine = MatchingEngine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        engine.set_trade_listener(move |trade| sink.lock().unwrap().push(trade));
        (engine, log)
    }

    fn submit(
        engine: &mut MatchingEngine,
        side: Side,
        price: Decimal,
        quantity: Quantity,
    ) -> OrderId {
        engine.submit(side, price, quantity, "AAPL", "C1").unwrap()
    }

    #[test]
    fn test_submit_rejects_invalid_values() {
        let mut engine = MatchingEngine::new();

        assert!(matches!(
            engine.submit(Side::Buy, dec!(0), 10, "AAPL", "C1"),
            Err(EngineError::InvalidOrder { .. })
        ));
        assert!(matches!(
            engine.submit(Side::Buy, dec!(-1.50), 10, "AAPL", "C1"),
            Err(EngineError::InvalidOrder { .. })
        ));
        assert!(matches!(
            engine.submit(Side::Sell, dec!(100), 0, "AAPL", "C1"),
            Err(EngineError::InvalidOrder { .. })
        ));

        // Rejections consume no ids and leave no state behind.
        assert_eq!(engine.total_orders(), 0);
        assert_eq!(engine.open_order_count(), 0);
    }

    #[test]
    fn test_order_ids_are_sequential() {
        let mut engine = MatchingEngine::new();
        assert_eq!(submit(&mut engine, Side::Buy, dec!(100), 10), "O1");
        assert_eq!(submit(&mut engine, Side::Sell, dec!(101), 10), "O2");
        assert_eq!(submit(&mut engine, Side::Buy, dec!(99), 10), "O3");
        assert_eq!(engine.total_orders(), 3);
    }

    #[test]
    fn test_simple_cross_full_fill() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Sell, dec!(100.50), 100);
        submit(&mut engine, Side::Sell, dec!(100.25), 50);
        submit(&mut engine, Side::Sell, dec!(99.75), 75);
        let buy = submit(&mut engine, Side::Buy, dec!(100.30), 80);

        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price, dec!(99.75));
        assert_eq!(trades[0].quantity, 75);
        assert_eq!(trades[1].price, dec!(100.25));
        assert_eq!(trades[1].quantity, 5);
        assert_eq!(trades[1].buy_order_id, buy);

        // The aggressor filled completely and never rested.
        assert!(engine.get(&buy).is_none());
        assert_eq!(engine.best_ask(), dec!(100.25));
        assert_eq!(engine.ask_depth(5), vec![(dec!(100.25), 45), (dec!(100.50), 100)]);
        assert_eq!(engine.best_bid(), Decimal::ZERO);
    }

    #[test]
    fn test_price_time_priority_within_level() {
        let (mut engine, log) = engine_with_log();

        let first = submit(&mut engine, Side::Buy, dec!(100), 10);
        let second = submit(&mut engine, Side::Buy, dec!(100), 20);
        submit(&mut engine, Side::Sell, dec!(100), 15);

        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].buy_order_id, first);
        assert_eq!(trades[0].quantity, 10);
        assert_eq!(trades[1].buy_order_id, second);
        assert_eq!(trades[1].quantity, 5);

        assert_eq!(engine.best_bid(), dec!(100));
        assert_eq!(engine.bid_size(), 15);
        assert_eq!(engine.get(&second).unwrap().status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_no_trade_when_prices_do_not_cross() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Buy, dec!(99), 10);
        submit(&mut engine, Side::Sell, dec!(101), 10);

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(engine.best_bid(), dec!(99));
        assert_eq!(engine.best_ask(), dec!(101));
        assert_eq!(engine.spread(), dec!(2));
    }

    #[test]
    fn test_cancel_resting_order_is_idempotent() {
        let mut engine = MatchingEngine::new();

        let order_id = submit(&mut engine, Side::Buy, dec!(100), 10);
        assert!(engine.cancel(&order_id));
        assert_eq!(engine.best_bid(), Decimal::ZERO);
        assert!(engine.get(&order_id).is_none());

        assert!(!engine.cancel(&order_id));
        assert!(!engine.cancel("O999"));
    }

    #[test]
    fn test_modify_loses_time_priority() {
        let (mut engine, log) = engine_with_log();

        let a = submit(&mut engine, Side::Buy, dec!(100), 10);
        let b = submit(&mut engine, Side::Buy, dec!(100), 10);

        assert!(engine.modify(&a, dec!(100), 10));
        submit(&mut engine, Side::Sell, dec!(100), 10);

        // B was filled, not A: A's re-insertion queued behind B.
        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy_order_id, b);
        assert!(engine.get(&a).is_some());
        assert!(engine.get(&b).is_none());
    }

    #[test]
    fn test_modify_rules() {
        let mut engine = MatchingEngine::new();

        assert!(!engine.modify("O999", dec!(100), 10));
        assert_eq!(
            engine.try_modify("O999", dec!(100), 10),
            Err(EngineError::UnknownOrder("O999".to_string()))
        );

        let resting = submit(&mut engine, Side::Buy, dec!(100), 10);
        assert!(!engine.modify(&resting, dec!(0), 10));
        assert!(!engine.modify(&resting, dec!(101), 0));

        // A partial fill freezes the order against modification.
        submit(&mut engine, Side::Sell, dec!(100), 4);
        assert_eq!(
            engine.try_modify(&resting, dec!(101), 10),
            Err(EngineError::NotModifiable(resting.clone()))
        );
        assert_eq!(engine.get(&resting).unwrap().filled_qty, 4);
    }

    #[test]
    fn test_modify_can_cross_immediately() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Sell, dec!(101), 10);
        let bid = submit(&mut engine, Side::Buy, dec!(99), 10);

        assert!(engine.modify(&bid, dec!(101), 10));

        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(101));
        assert_eq!(trades[0].quantity, 10);
        assert!(engine.get(&bid).is_none());
        assert_eq!(engine.open_order_count(), 0);
    }

    #[test]
    fn test_partial_fill_then_cancel() {
        let (mut engine, log) = engine_with_log();

        let a = submit(&mut engine, Side::Sell, dec!(100), 10);
        submit(&mut engine, Side::Buy, dec!(100), 4);

        {
            let trades = log.lock().unwrap();
            assert_eq!(trades.len(), 1);
            assert_eq!(trades[0].price, dec!(100));
            assert_eq!(trades[0].quantity, 4);
        }
        let open = engine.get(&a).unwrap();
        assert_eq!(open.status, OrderStatus::PartiallyFilled);
        assert_eq!(open.remaining(), 6);

        assert!(engine.cancel(&a));
        assert_eq!(engine.open_order_count(), 0);
        assert_eq!(engine.best_ask(), Decimal::ZERO);
    }

    #[test]
    fn test_aggressor_pays_resting_price() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Sell, dec!(99), 10);
        submit(&mut engine, Side::Buy, dec!(101), 10);

        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(99));
    }

    #[test]
    fn test_sell_sweeps_best_bids_first() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Buy, dec!(103), 10);
        submit(&mut engine, Side::Buy, dec!(102), 10);
        submit(&mut engine, Side::Buy, dec!(101), 10);
        submit(&mut engine, Side::Buy, dec!(100), 10);

        submit(&mut engine, Side::Sell, dec!(101), 25);

        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].price, dec!(103));
        assert_eq!(trades[1].price, dec!(102));
        assert_eq!(trades[2].price, dec!(101));
        assert_eq!(trades[2].quantity, 5);

        assert_eq!(engine.best_bid(), dec!(101));
        assert_eq!(engine.bid_size(), 5);
    }

    #[test]
    fn test_residual_rests_after_sweeping_the_book() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Sell, dec!(100), 5);
        submit(&mut engine, Side::Sell, dec!(101), 5);
        let buy = submit(&mut engine, Side::Buy, dec!(102), 12);

        assert_eq!(log.lock().unwrap().len(), 2);
        let resting = engine.get(&buy).unwrap();
        assert_eq!(resting.status, OrderStatus::PartiallyFilled);
        assert_eq!(resting.remaining(), 2);
        assert_eq!(engine.best_bid(), dec!(102));
        assert_eq!(engine.best_ask(), Decimal::ZERO);
    }

    #[test]
    fn test_trade_conservation() {
        let (mut engine, log) = engine_with_log();

        submit(&mut engine, Side::Sell, dec!(100), 30);
        submit(&mut engine, Side::Sell, dec!(101), 20);
        submit(&mut engine, Side::Buy, dec!(101), 35);
        submit(&mut engine, Side::Buy, dec!(100), 10);
        submit(&mut engine, Side::Sell, dec!(99), 25);

        let trades = log.lock().unwrap();
        let traded: Quantity = trades.iter().map(|t| t.quantity).sum();
        assert_eq!(traded, 45);

        // 45 was submitted to buy and 75 to sell; fills net out equal on
        // both sides once the open remainder is subtracted.
        let open_buy: Quantity = engine.bid_depth(10).iter().map(|(_, q)| q).sum();
        let open_sell: Quantity = engine.ask_depth(10).iter().map(|(_, q)| q).sum();
        assert_eq!(45 - open_buy, traded);
        assert_eq!(75 - open_sell, traded);
    }

    #[test]
    fn test_submit_then_cancel_restores_book() {
        let mut engine = MatchingEngine::new();

        submit(&mut engine, Side::Buy, dec!(99), 10);
        submit(&mut engine, Side::Sell, dec!(102), 10);
        let bids_before = engine.bid_depth(10);
        let asks_before = engine.ask_depth(10);

        let order_id = submit(&mut engine, Side::Buy, dec!(100), 7);
        assert!(engine.cancel(&order_id));

        assert_eq!(engine.bid_depth(10), bids_before);
        assert_eq!(engine.ask_depth(10), asks_before);
    }

    #[test]
    fn test_batch_defines_arrival_order() {
        let (mut engine, log) = engine_with_log();

        let order = |side, price, quantity| NewOrder {
            side,
            price,
            quantity,
            symbol: "AAPL".to_string(),
            client_id: "BATCH".to_string(),
        };
        let results = engine.submit_batch(vec![
            order(Side::Sell, dec!(100), 10),
            order(Side::Sell, dec!(100), 10),
            order(Side::Buy, dec!(0), 10),
            order(Side::Buy, dec!(100), 10),
        ]);

        assert_eq!(results.len(), 4);
        assert!(results[2].is_err());

        // The buy consumed the older of the two sells.
        let trades = log.lock().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].sell_order_id, *results[0].as_ref().unwrap());
    }

    #[test]
    fn test_listener_runs_inside_submit() {
        let mut engine = MatchingEngine::new();
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        engine.set_trade_listener(move |_| *sink.lock().unwrap() += 1);

        submit(&mut engine, Side::Sell, dec!(100), 10);
        submit(&mut engine, Side::Buy, dec!(100), 10);

        // Both fills were delivered strictly before submit returned.
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_top_of_book_tracks_every_mutation() {
        let mut engine = MatchingEngine::new();

        let b1 = submit(&mut engine, Side::Buy, dec!(100), 10);
        submit(&mut engine, Side::Buy, dec!(99), 10);
        assert_eq!(engine.best_bid(), dec!(100));
        assert_eq!(engine.bid_size(), 10);

        engine.cancel(&b1);
        assert_eq!(engine.best_bid(), dec!(99));
        assert_eq!(engine.bid_size(), 10);

        submit(&mut engine, Side::Sell, dec!(99), 10);
        assert_eq!(engine.best_bid(), Decimal::ZERO);
        assert_eq!(engine.bid_size(), 0);
    }
}
