pub mod book;
pub mod engine;
pub mod error;
pub mod order;

pub use book::{OrderBook, TradeListener};
pub use engine::MatchingEngine;
pub use error::EngineError;
pub use order::{
    NewOrder, Order, OrderId, OrderStatus, Price, Quantity, Side, Trade, TradeId,
};
