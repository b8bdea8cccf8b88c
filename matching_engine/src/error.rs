use rust_decimal::Decimal;
use thiserror::Error;

use crate::order::{OrderId, Quantity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid order: price {price}, quantity {quantity}")]
    InvalidOrder { price: Decimal, quantity: Quantity },

    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error("order {0} is not modifiable")]
    NotModifiable(OrderId),
}
