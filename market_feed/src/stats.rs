use std::collections::VecDeque;

use matching_engine::Trade;
use rust_decimal::Decimal;
use tracing::info;

// Bounds memory on long sessions; totals keep counting past it.
const HISTORY_LIMIT: usize = 1000;

/// Running totals over the trade stream plus a bounded history of recent
/// receipts. Fed from the engine's trade listener.
#[derive(Debug, Default)]
pub struct TradeStats {
    total_trades: u64,
    total_volume: Decimal,
    history: VecDeque<Trade>,
}

impl TradeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: &Trade) {
        self.total_trades += 1;
        self.total_volume += trade.price * Decimal::from(trade.quantity);
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(trade.clone());
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    /// Notional traded: Σ price × quantity.
    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    /// Average notional per trade.
    pub fn average_trade_size(&self) -> Decimal {
        if self.total_trades == 0 {
            Decimal::ZERO
        } else {
            self.total_volume / Decimal::from(self.total_trades)
        }
    }

    pub fn last_trade(&self) -> Option<&Trade> {
        self.history.back()
    }

    pub fn log_summary(&self) {
        info!(
            total_trades = self.total_trades,
            total_volume = %self.total_volume,
            average_trade_size = %self.average_trade_size(),
            "trading statistics"
        );
        if let Some(trade) = self.last_trade() {
            info!(
                quantity = trade.quantity,
                price = %trade.price,
                "latest trade"
            );
        }
    }
}
