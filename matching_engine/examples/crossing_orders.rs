use matching_engine::{MatchingEngine, Side};
use rust_decimal_macros::dec;

fn main() {
    let mut engine = MatchingEngine::new();
    engine.set_trade_listener(|trade| {
        println!(
            "{}: {} @ {} ({} <- {})",
            trade.trade_id, trade.quantity, trade.price, trade.buy_order_id, trade.sell_order_id
        );
    });

    engine.submit(Side::Sell, dec!(100.50), 100, "DEMO", "maker").unwrap();
    engine.submit(Side::Sell, dec!(100.25), 50, "DEMO", "maker").unwrap();

    // Crosses both asks, paying each resting price in turn, and rests the
    // unfilled remainder.
    let taker = engine.submit(Side::Buy, dec!(100.50), 180, "DEMO", "taker").unwrap();

    let resting = engine.get(&taker).expect("residual rests on the book");
    println!(
        "{} rests with {} of {} open at {}",
        taker,
        resting.remaining(),
        resting.original_qty,
        resting.limit_price
    );
    assert_eq!(engine.best_bid(), dec!(100.50));
    assert_eq!(engine.best_ask(), dec!(0));
}
