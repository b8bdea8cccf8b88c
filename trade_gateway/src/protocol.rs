use std::sync::{Arc, Mutex};

use matching_engine::{MatchingEngine, OrderStatus, Price, Quantity, Side};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lock_engine;

pub type SharedEngine = Arc<Mutex<MatchingEngine>>;

const WEB_CLIENT: &str = "WEB_CLIENT";

/// Newline-delimited JSON requests accepted on the control socket and the
/// websocket alike. Prices travel as JSON numbers and are converted to
/// Decimal at this boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubmitOrder {
        #[serde(rename = "orderType")]
        order_type: Side,
        price: f64,
        quantity: Quantity,
        #[serde(default = "default_symbol")]
        symbol: String,
    },
    CancelOrder {
        #[serde(rename = "orderId")]
        order_id: String,
    },
}

fn default_symbol() -> String {
    "DEFAULT".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
    },
    OrderSubmitted {
        #[serde(rename = "orderId")]
        order_id: String,
        status: String,
    },
    Error {
        message: String,
    },
    OrderCancelled {
        #[serde(rename = "orderId")]
        order_id: String,
        status: String,
    },
    Trade {
        #[serde(rename = "tradeId")]
        trade_id: String,
        symbol: String,
        price: f64,
        quantity: Quantity,
    },
    OrderbookUpdate {
        symbol: String,
        #[serde(rename = "bestBid")]
        best_bid: f64,
        #[serde(rename = "bestAsk")]
        best_ask: f64,
        #[serde(rename = "bidSize")]
        bid_size: Quantity,
        #[serde(rename = "askSize")]
        ask_size: Quantity,
        spread: f64,
    },
    OrderStatus {
        #[serde(rename = "orderId")]
        order_id: String,
        status: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn welcome() -> Self {
        ServerMessage::Welcome {
            message: "Connected to Limit Order Book Trading System".to_string(),
        }
    }
}

pub fn wire_price(price: Price) -> f64 {
    price.to_f64().unwrap_or(0.0)
}

/// Services one request line and returns the direct reply plus, for
/// accepted operations, an order-status notification for all clients.
pub fn handle_request(
    engine: &SharedEngine,
    raw: &str,
) -> (ServerMessage, Option<ServerMessage>) {
    let message = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => message,
        Err(err) => {
            return (
                ServerMessage::Error {
                    message: format!("invalid request: {err}"),
                },
                None,
            )
        }
    };

    match message {
        ClientMessage::SubmitOrder {
            order_type,
            price,
            quantity,
            symbol,
        } => {
            // NaN and infinities collapse to zero and fail validation.
            let price = Decimal::from_f64(price).unwrap_or_default();
            let outcome = {
                let mut engine = lock_engine(engine);
                match engine.submit(order_type, price, quantity, &symbol, WEB_CLIENT) {
                    Ok(order_id) => {
                        // Gone from the book means it filled on the way in.
                        let status = engine
                            .get(&order_id)
                            .map(|order| order.status)
                            .unwrap_or(OrderStatus::Filled);
                        Ok((order_id, status))
                    }
                    Err(err) => Err(err),
                }
            };

            match outcome {
                Ok((order_id, status)) => {
                    let notification = ServerMessage::OrderStatus {
                        order_id: order_id.clone(),
                        status: status.to_string(),
                        message: format!("order {order_id} accepted"),
                    };
                    (
                        ServerMessage::OrderSubmitted {
                            order_id,
                            status: "success".to_string(),
                        },
                        Some(notification),
                    )
                }
                Err(err) => (
                    ServerMessage::Error {
                        message: err.to_string(),
                    },
                    None,
                ),
            }
        }
        ClientMessage::CancelOrder { order_id } => {
            let cancelled = lock_engine(engine).cancel(&order_id);
            let notification = cancelled.then(|| ServerMessage::OrderStatus {
                order_id: order_id.clone(),
                status: OrderStatus::Cancelled.to_string(),
                message: format!("order {order_id} cancelled"),
            });
            (
                ServerMessage::OrderCancelled {
                    order_id,
                    status: if cancelled { "success" } else { "failed" }.to_string(),
                },
                notification,
            )
        }
    }
}

/// Current top of book as an `orderbook_update` broadcast.
pub fn book_snapshot(engine: &SharedEngine, symbol: &str) -> ServerMessage {
    let engine = lock_engine(engine);
    ServerMessage::OrderbookUpdate {
        symbol: symbol.to_string(),
        best_bid: wire_price(engine.best_bid()),
        best_ask: wire_price(engine.best_ask()),
        bid_size: engine.bid_size(),
        ask_size: engine.ask_size(),
        spread: wire_price(engine.spread()),
    }
}
