use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type OrderId = String;
pub type TradeId = String;

// Decimal prices avoid the comparison drift a float ladder key would suffer
pub type Price = Decimal;
pub type Quantity = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses never transition again and never rest on the book.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        })
    }
}

/// A limit order: immutable identity plus mutable fill state. Open orders
/// are owned exclusively by the book; callers only ever see clones or
/// short-lived references.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub side: Side,
    pub limit_price: Price,
    pub original_qty: Quantity,
    pub filled_qty: Quantity,
    pub status: OrderStatus,
    pub arrival_time: DateTime<Utc>,
    pub symbol: String,
    pub client_id: String,
}

impl Order {
    pub fn new(
        order_id: OrderId,
        side: Side,
        limit_price: Price,
        original_qty: Quantity,
        symbol: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            side,
            limit_price,
            original_qty,
            filled_qty: 0,
            status: OrderStatus::Pending,
            arrival_time: Utc::now(),
            symbol: symbol.into(),
            client_id: client_id.into(),
        }
    }

    pub fn remaining(&self) -> Quantity {
        self.original_qty - self.filled_qty
    }

    pub fn is_fully_filled(&self) -> bool {
        self.remaining() == 0
    }

    /// Records a fill. `quantity` must not exceed `remaining()`.
    pub(crate) fn fill(&mut self, quantity: Quantity) {
        self.filled_qty += quantity;
        self.status = if self.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

/// Immutable receipt of a match, handed to the trade listener by value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: String,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

/// Parameters of an order not yet accepted by the engine; used by
/// `submit_batch` and the file loaders.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub symbol: String,
    pub client_id: String,
}
