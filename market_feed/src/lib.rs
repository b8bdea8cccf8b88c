pub mod csv;
pub mod jsonl;
pub mod simulation;
pub mod stats;

pub use csv::load_orders_from_csv;
pub use jsonl::load_orders_from_jsonl;
pub use simulation::MarketSimulation;
pub use stats::TradeStats;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
