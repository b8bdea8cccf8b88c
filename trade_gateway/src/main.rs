use std::sync::{Arc, Mutex};
use std::time::Duration;

use market_feed::{MarketSimulation, TradeStats};
use matching_engine::{MatchingEngine, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use trade_gateway::protocol::{book_snapshot, wire_price, ServerMessage, SharedEngine};
use trade_gateway::server::LineServer;
use trade_gateway::websocket::{router, WsState};
use trade_gateway::{lock_engine, publish};

fn main() {
    use std::io::Write;

    std::panic::set_hook(Box::new(|panic_info| {
        let _ = std::io::stderr().write_all(format!("PANIC: {:?}\n", panic_info).as_bytes());
        let _ = std::io::stderr().flush();
        std::process::exit(1);
    }));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    match rt.block_on(tokio_main()) {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn tokio_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trade_gateway=info,market_feed=info".into()),
        )
        .init();

    info!("Starting limit order book trading system...");

    let symbol = std::env::var("SYMBOL").unwrap_or_else(|_| "AAPL".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let ws_addr = std::env::var("WS_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());

    let engine: SharedEngine = Arc::new(Mutex::new(MatchingEngine::new()));
    let stats = Arc::new(Mutex::new(TradeStats::new()));
    let (events, _) = broadcast::channel::<String>(1000);

    // The single engine listener: record statistics, then relay to clients.
    {
        let stats = stats.clone();
        let events = events.clone();
        lock_engine(&engine).set_trade_listener(move |trade| {
            info!(
                trade_id = %trade.trade_id,
                quantity = trade.quantity,
                price = %trade.price,
                "trade executed"
            );
            if let Ok(mut stats) = stats.lock() {
                stats.record(&trade);
            }
            publish(
                &events,
                &ServerMessage::Trade {
                    trade_id: trade.trade_id.clone(),
                    symbol: trade.symbol.clone(),
                    price: wire_price(trade.price),
                    quantity: trade.quantity,
                },
            );
        });
    }

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%bind_addr, error = %err, "failed to bind control socket");
            std::process::exit(1);
        }
    };
    info!(%bind_addr, "control socket listening");
    tokio::spawn(LineServer::new(engine.clone(), events.clone()).run(listener));

    let ws_listener = TcpListener::bind(&ws_addr).await?;
    info!(%ws_addr, "websocket listening");
    let ws_router = router(WsState {
        engine: engine.clone(),
        events: events.clone(),
    });
    tokio::spawn(async move {
        if let Err(err) = axum::serve(ws_listener, ws_router).await {
            error!(error = %err, "websocket server terminated");
        }
    });

    submit_demo_orders(&engine, &symbol);
    log_book(&engine);

    let mut simulation = MarketSimulation::start(engine.clone(), &symbol, dec!(100.00), 20);

    // Periodic top-of-book broadcast for connected clients.
    {
        let engine = engine.clone();
        let events = events.clone();
        let symbol = symbol.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                publish(&events, &book_snapshot(&engine, &symbol));
            }
        });
    }

    info!("trading system ready; close stdin to shut down");
    wait_for_stdin_eof().await;

    simulation.stop();
    if let Ok(stats) = stats.lock() {
        stats.log_summary();
    }
    info!("shutdown complete");
    Ok(())
}

/// The demonstration order set: three resting asks, two resting bids and
/// one bid that crosses the book on arrival.
fn submit_demo_orders(engine: &SharedEngine, symbol: &str) {
    let demo: [(Side, Decimal, u64, &str); 6] = [
        (Side::Sell, dec!(100.50), 100, "CLIENT1"),
        (Side::Sell, dec!(100.25), 50, "CLIENT2"),
        (Side::Sell, dec!(99.75), 75, "CLIENT3"),
        (Side::Buy, dec!(100.00), 60, "CLIENT4"),
        (Side::Buy, dec!(99.50), 40, "CLIENT5"),
        (Side::Buy, dec!(100.30), 80, "CLIENT6"),
    ];

    let mut engine = lock_engine(engine);
    for (side, price, quantity, client_id) in demo {
        match engine.submit(side, price, quantity, symbol, client_id) {
            Ok(order_id) => {
                info!(%order_id, %side, %price, quantity, "demo order submitted");
            }
            Err(err) => error!(error = %err, "demo order rejected"),
        }
    }
}

fn log_book(engine: &SharedEngine) {
    let engine = lock_engine(engine);
    info!(
        best_bid = %engine.best_bid(),
        bid_size = engine.bid_size(),
        best_ask = %engine.best_ask(),
        ask_size = engine.ask_size(),
        spread = %engine.spread(),
        "top of book"
    );
    // Asks print high-to-low so the touch sits in the middle of the log.
    for (price, quantity) in engine.ask_depth(5).into_iter().rev() {
        info!("  ask {price} | {quantity}");
    }
    for (price, quantity) in engine.bid_depth(5) {
        info!("  bid {price} | {quantity}");
    }
}

async fn wait_for_stdin_eof() {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {}
}
