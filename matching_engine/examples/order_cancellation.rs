use matching_engine::{MatchingEngine, Side};
use rust_decimal_macros::dec;

fn main() {
    let mut engine = MatchingEngine::new();

    let order_id = engine.submit(Side::Buy, dec!(100), 10, "DEMO", "maker").unwrap();
    println!("submitted {order_id}, best bid {}", engine.best_bid());

    assert!(engine.cancel(&order_id));
    println!("cancelled {order_id}, best bid {}", engine.best_bid());

    // A second cancel of the same id is a no-op.
    assert!(!engine.cancel(&order_id));

    // Modify only works while the order has no fills, and costs queue
    // position.
    let a = engine.submit(Side::Buy, dec!(100), 10, "DEMO", "maker").unwrap();
    let b = engine.submit(Side::Buy, dec!(100), 10, "DEMO", "maker").unwrap();
    assert!(engine.modify(&a, dec!(100), 15));

    engine.submit(Side::Sell, dec!(100), 10, "DEMO", "taker").unwrap();
    assert!(engine.get(&b).is_none(), "b had time priority after a's modify");
    assert_eq!(engine.get(&a).unwrap().remaining(), 15);
}
