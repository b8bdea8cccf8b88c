use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use matching_engine::{MatchingEngine, NewOrder, Price, Quantity, Side};
use serde::Deserialize;
use tracing::{info, warn};

use crate::FeedError;

const JSON_CLIENT: &str = "JSON_CLIENT";

/// One flat object per line. Missing fields default (type=BUY, price=0,
/// quantity=0, symbol=DEFAULT); the engine then rejects anything with a
/// non-positive price or quantity.
#[derive(Debug, Deserialize)]
struct OrderLine {
    #[serde(rename = "type", default = "buy_side")]
    side: Side,
    #[serde(default)]
    price: Price,
    #[serde(default)]
    quantity: Quantity,
    #[serde(default = "default_symbol")]
    symbol: String,
}

fn buy_side() -> Side {
    Side::Buy
}

fn default_symbol() -> String {
    "DEFAULT".to_string()
}

/// Loads line-delimited JSON orders. Unparseable lines are skipped with a
/// diagnostic. Returns the number of orders handed to the engine.
pub fn load_orders_from_jsonl(
    engine: &mut MatchingEngine,
    path: impl AsRef<Path>,
) -> Result<usize, FeedError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut orders = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OrderLine>(&line) {
            Ok(parsed) => orders.push(NewOrder {
                side: parsed.side,
                price: parsed.price,
                quantity: parsed.quantity,
                symbol: parsed.symbol,
                client_id: JSON_CLIENT.to_string(),
            }),
            Err(err) => warn!(line = %line, error = %err, "skipping malformed JSON line"),
        }
    }

    let count = orders.len();
    engine.submit_batch(orders);
    info!(count, path = %path.display(), "loaded orders from JSON lines");
    Ok(count)
}
