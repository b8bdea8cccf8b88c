use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use matching_engine::{MatchingEngine, Price, Side};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

const SIM_CLIENT: &str = "SIM_CLIENT";
const ORDER_PACING: Duration = Duration::from_millis(10);

/// Background feed of pseudo-random limit orders around a base price,
/// used to put liquidity on an otherwise quiet book.
pub struct MarketSimulation {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MarketSimulation {
    /// Spawns a worker that submits `num_orders` orders: uniform side,
    /// price within ±5% of `base_price` quantized to cents, quantity
    /// 1..=100, one order every 10ms.
    pub fn start(
        engine: Arc<Mutex<MatchingEngine>>,
        symbol: &str,
        base_price: Price,
        num_orders: usize,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let symbol = symbol.to_string();
        info!(%symbol, %base_price, num_orders, "starting market data simulation");

        let worker = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..num_orders {
                if !flag.load(Ordering::Relaxed) {
                    break;
                }

                let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                let factor = Decimal::from(rng.gen_range(9_500u32..=10_500)) / Decimal::from(10_000u32);
                let price = (base_price * factor).round_dp(2);
                let quantity = rng.gen_range(1..=100);

                let result = match engine.lock() {
                    Ok(mut engine) => engine.submit(side, price, quantity, &symbol, SIM_CLIENT),
                    // The engine's owner panicked; stop feeding it.
                    Err(_) => break,
                };
                if let Err(err) = result {
                    warn!(error = %err, "simulation order rejected");
                }

                thread::sleep(ORDER_PACING);
            }
            flag.store(false, Ordering::Relaxed);
        });

        Self {
            running,
            worker: Some(worker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Signals the worker and waits for it to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!("market data simulation stopped");
        }
    }
}

impl Drop for MarketSimulation {
    fn drop(&mut self) {
        self.stop();
    }
}
