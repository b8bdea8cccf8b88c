use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineError;
use crate::order::{Order, OrderId, OrderStatus, Price, Quantity, Side, Trade};

/// Invoked synchronously for every executed trade, inside the match loop.
/// A listener must not call back into the engine that owns it.
pub type TradeListener = Box<dyn FnMut(Trade) + Send>;

/// Price-time-priority order book. Ladder levels queue order ids; the
/// orders themselves live exclusively in the `orders` index, so an order is
/// either open (present in both) or gone (present in neither).
pub struct OrderBook {
    // Both ladders are ascending BTreeMaps; the bid side is read in reverse.
    bids: BTreeMap<Price, VecDeque<OrderId>>,
    asks: BTreeMap<Price, VecDeque<OrderId>>,
    orders: HashMap<OrderId, Order>,
    best_bid: Price,
    best_ask: Price,
    bid_size: Quantity,
    ask_size: Quantity,
    listener: Option<TradeListener>,
    trade_counter: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
            best_bid: Decimal::ZERO,
            best_ask: Decimal::ZERO,
            bid_size: 0,
            ask_size: 0,
            listener: None,
            trade_counter: 0,
        }
    }

    /// Rests an open order at the tail of its (side, price) queue.
    pub fn add(&mut self, order: Order) -> Result<(), EngineError> {
        if order.remaining() == 0
            || order.status.is_terminal()
            || self.orders.contains_key(&order.order_id)
        {
            return Err(EngineError::InvalidOrder {
                price: order.limit_price,
                quantity: order.remaining(),
            });
        }

        let ladder = self.ladder_mut(order.side);
        ladder
            .entry(order.limit_price)
            .or_default()
            .push_back(order.order_id.clone());
        self.orders.insert(order.order_id.clone(), order);
        self.refresh_top_of_book();
        Ok(())
    }

    /// Removes an order from its ladder and the id index without touching
    /// its status; callers set the status first when the removal reflects a
    /// cancel. Returns the removed order, `None` if the id is unknown.
    pub fn remove(&mut self, order_id: &str) -> Option<Order> {
        let order = self.orders.remove(order_id)?;

        let ladder = self.ladder_mut(order.side);
        if let Some(queue) = ladder.get_mut(&order.limit_price) {
            queue.retain(|id| id != order_id);
            if queue.is_empty() {
                ladder.remove(&order.limit_price);
            }
        }

        self.refresh_top_of_book();
        Some(order)
    }

    /// Cancels an open order; returns its final state so callers can
    /// observe `filled_qty` at cancellation.
    pub fn cancel(&mut self, order_id: &str) -> Option<Order> {
        self.orders.get_mut(order_id)?.status = OrderStatus::Cancelled;
        self.remove(order_id)
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Zero when the bid side is empty.
    pub fn best_bid(&self) -> Price {
        self.best_bid
    }

    /// Zero when the ask side is empty.
    pub fn best_ask(&self) -> Price {
        self.best_ask
    }

    /// Open quantity at the best bid level.
    pub fn bid_size(&self) -> Quantity {
        self.bid_size
    }

    /// Open quantity at the best ask level.
    pub fn ask_size(&self) -> Quantity {
        self.ask_size
    }

    /// `best_ask - best_bid`; zero unless both sides are populated.
    pub fn spread(&self) -> Price {
        if self.bids.is_empty() || self.asks.is_empty() {
            Decimal::ZERO
        } else {
            self.best_ask - self.best_bid
        }
    }

    /// Up to `levels` (price, open quantity) pairs, best bid first.
    pub fn bid_depth(&self, levels: usize) -> Vec<(Price, Quantity)> {
        self.bids
            .iter()
            .rev()
            .take(levels)
            .map(|(price, queue)| (*price, self.queue_remaining(queue)))
            .collect()
    }

    /// Up to `levels` (price, open quantity) pairs, best ask first.
    pub fn ask_depth(&self, levels: usize) -> Vec<(Price, Quantity)> {
        self.asks
            .iter()
            .take(levels)
            .map(|(price, queue)| (*price, self.queue_remaining(queue)))
            .collect()
    }

    pub fn set_trade_listener(&mut self, listener: impl FnMut(Trade) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Best price level on `side` together with the oldest order resting
    /// there. Empty queues encountered on the way are erased.
    pub(crate) fn front_of_best_level(&mut self, side: Side) -> Option<(Price, OrderId)> {
        loop {
            let (price, front) = match side {
                Side::Buy => {
                    let (price, queue) = self.bids.iter().next_back()?;
                    (*price, queue.front().cloned())
                }
                Side::Sell => {
                    let (price, queue) = self.asks.iter().next()?;
                    (*price, queue.front().cloned())
                }
            };
            match front {
                Some(order_id) => return Some((price, order_id)),
                None => {
                    self.ladder_mut(side).remove(&price);
                }
            }
        }
    }

    /// Executes a match of `quantity` between the incoming `taker` and the
    /// resting order `maker_id` at the maker's limit price. Fills both
    /// sides, drops the maker if it is done, refreshes the top of book and
    /// only then hands the receipt to the listener.
    pub(crate) fn execute_trade(&mut self, taker: &mut Order, maker_id: &str, quantity: Quantity) {
        self.trade_counter += 1;
        let trade_id = format!("T{}", self.trade_counter);

        let maker = self
            .orders
            .get_mut(maker_id)
            .expect("resting order is indexed by its ladder");
        let price = maker.limit_price;
        maker.fill(quantity);
        taker.fill(quantity);

        // The receipt is labelled by side; the symbol travels with the buy.
        let (buy_order_id, sell_order_id, symbol) = match taker.side {
            Side::Buy => (
                taker.order_id.clone(),
                maker.order_id.clone(),
                taker.symbol.clone(),
            ),
            Side::Sell => (
                maker.order_id.clone(),
                taker.order_id.clone(),
                maker.symbol.clone(),
            ),
        };
        let maker_done = maker.is_fully_filled();

        let trade = Trade {
            trade_id,
            buy_order_id,
            sell_order_id,
            symbol,
            price,
            quantity,
            timestamp: Utc::now(),
        };

        if maker_done {
            let _ = self.remove(maker_id);
        } else {
            self.refresh_top_of_book();
        }

        debug!(
            trade_id = %trade.trade_id,
            price = %trade.price,
            quantity = trade.quantity,
            "trade executed"
        );

        if let Some(listener) = self.listener.as_mut() {
            listener(trade);
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut BTreeMap<Price, VecDeque<OrderId>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn queue_remaining(&self, queue: &VecDeque<OrderId>) -> Quantity {
        queue
            .iter()
            .filter_map(|id| self.orders.get(id))
            .map(Order::remaining)
            .sum()
    }

    fn refresh_top_of_book(&mut self) {
        let (best_bid, bid_size) = self
            .bids
            .iter()
            .next_back()
            .map(|(price, queue)| (*price, self.queue_remaining(queue)))
            .unwrap_or((Decimal::ZERO, 0));
        let (best_ask, ask_size) = self
            .asks
            .iter()
            .next()
            .map(|(price, queue)| (*price, self.queue_remaining(queue)))
            .unwrap_or((Decimal::ZERO, 0));

        self.best_bid = best_bid;
        self.bid_size = bid_size;
        self.best_ask = best_ask;
        self.ask_size = ask_size;
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
