use matching_engine::{MatchingEngine, Side};
use rust_decimal_macros::dec;

fn main() {
    let mut engine = MatchingEngine::new();

    engine.submit(Side::Buy, dec!(99), 100, "DEMO", "maker").unwrap();
    engine.submit(Side::Buy, dec!(98), 150, "DEMO", "maker").unwrap();
    engine.submit(Side::Buy, dec!(97), 200, "DEMO", "maker").unwrap();

    engine.submit(Side::Sell, dec!(101), 100, "DEMO", "maker").unwrap();
    engine.submit(Side::Sell, dec!(102), 150, "DEMO", "maker").unwrap();
    engine.submit(Side::Sell, dec!(103), 200, "DEMO", "maker").unwrap();

    println!("Best bid: {}", engine.best_bid());
    println!("Best ask: {}", engine.best_ask());
    println!("Spread: {}", engine.spread());
    println!("Ask depth: {:?}", engine.ask_depth(3));
    println!("Bid depth: {:?}", engine.bid_depth(3));

    assert_eq!(engine.best_bid(), dec!(99));
    assert_eq!(engine.best_ask(), dec!(101));
    assert_eq!(engine.spread(), dec!(2));
}
