use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use matching_engine::{MatchingEngine, NewOrder, Price, Quantity, Side};
use tracing::{info, warn};

use crate::FeedError;

const DEFAULT_SYMBOL: &str = "DEFAULT";
const CSV_CLIENT: &str = "CSV_CLIENT";

/// Loads one order per line: `side, price, quantity [, symbol [, client_id]]`.
/// A first line whose leading field is `type`/`Type` is treated as a header.
/// Malformed lines are skipped with a diagnostic; the loader never aborts on
/// them. Returns the number of orders handed to the engine.
pub fn load_orders_from_csv(
    engine: &mut MatchingEngine,
    path: impl AsRef<Path>,
) -> Result<usize, FeedError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut orders = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if index == 0 && is_header(&line) {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        match parse_csv_line(&line) {
            Some(order) => orders.push(order),
            None => warn!(line = %line, "skipping malformed CSV line"),
        }
    }

    let count = orders.len();
    engine.submit_batch(orders);
    info!(count, path = %path.display(), "loaded orders from CSV");
    Ok(count)
}

fn is_header(line: &str) -> bool {
    matches!(
        line.split(',').next().map(str::trim),
        Some("type") | Some("Type")
    )
}

fn parse_csv_line(line: &str) -> Option<NewOrder> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return None;
    }

    let side = parse_side(fields[0])?;
    let price: Price = fields[1].parse().ok()?;
    let quantity: Quantity = fields[2].parse().ok()?;
    let symbol = fields
        .get(3)
        .copied()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYMBOL);
    let client_id = fields
        .get(4)
        .copied()
        .filter(|s| !s.is_empty())
        .unwrap_or(CSV_CLIENT);

    Some(NewOrder {
        side,
        price,
        quantity,
        symbol: symbol.to_string(),
        client_id: client_id.to_string(),
    })
}

fn parse_side(field: &str) -> Option<Side> {
    match field.to_ascii_uppercase().as_str() {
        "BUY" => Some(Side::Buy),
        "SELL" => Some(Side::Sell),
        _ => None,
    }
}
