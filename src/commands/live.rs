//! Paper trading command
//!
//! Drives the strategy against live completed bars with the simulated
//! venue: an async cycle loop with graceful ctrl-c shutdown that flattens
//! the position and cancels resident orders before exit. Adapters for
//! real-money venues are a deployment concern outside this crate.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use breakout_strategies::feed::KlineFeed;
use breakout_strategies::venue::{PaperVenue, Venue};
use breakout_strategies::{BreakoutStrategy, Config};

/// Paper trader state
struct PaperTrader {
    config: Config,
    strategy: BreakoutStrategy,
    venue: PaperVenue,
    feed: KlineFeed,
    cycle_count: u32,
}

impl PaperTrader {
    fn new(config: Config) -> Result<Self> {
        let strategy =
            BreakoutStrategy::from_config(&config).context("Failed to build strategy")?;
        let feed = KlineFeed::new(
            config.instrument.symbol.clone(),
            config.instrument.timeframe.clone(),
            config.instrument.tick_size,
        );

        Ok(PaperTrader {
            config,
            strategy,
            venue: PaperVenue::new(),
            feed,
            cycle_count: 0,
        })
    }

    async fn run_cycle(&mut self) -> Result<()> {
        self.cycle_count += 1;

        let Some(bar) = self.feed.poll_completed().await? else {
            return Ok(());
        };

        info!(
            cycle = self.cycle_count,
            time = %bar.timestamp,
            open = bar.open,
            high = bar.high,
            low = bar.low,
            close = bar.close,
            "bar close"
        );

        // fills first: executions belonging to this bar are observed
        // before the bar-close logic runs, like a live venue would order
        // its callbacks
        self.venue.on_bar(&bar);
        self.drain_events();

        self.strategy.on_bar_close(&bar, &mut self.venue);
        self.drain_events();

        info!(
            cycle = self.cycle_count,
            position = ?self.venue.market_position(),
            open_orders = self.venue.open_order_count(),
            "cycle complete"
        );
        Ok(())
    }

    fn drain_events(&mut self) {
        // venue calls made while handling an event enqueue further events;
        // keep draining until the stream is quiet
        loop {
            let events = self.venue.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.strategy.on_venue_event(&event, &mut self.venue);
            }
        }
    }

    fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if !self.venue.market_position().is_flat() {
            warn!("Closing open position due to shutdown");
            self.venue.exit_position(&self.config.strategy.signal);
        }
        for handle in self.venue.open_orders() {
            self.venue.cancel_order(handle.id);
        }
        self.drain_events();

        info!(
            cycles = self.cycle_count,
            "Shutdown complete, venue is flat"
        );
    }
}

pub fn run(config_path: String, interval_secs: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, interval_secs))
}

async fn run_async(config_path: String, interval_secs: u64) -> Result<()> {
    let config = Config::from_file(&config_path)
        .context(format!("Failed to load config from {}", config_path))?;

    info!("=== breakout paper trading ===");
    info!(
        symbol = %config.instrument.symbol,
        timeframe = %config.instrument.timeframe,
        direction = ?config.strategy.direction,
        "deployment"
    );
    if let Some(rotation) = &config.rotation {
        info!(
            instance = rotation.instance_index,
            of = rotation.instances,
            token = %rotation.token_path,
            "rotation enabled"
        );
    }

    let mut trader = PaperTrader::new(config)?;

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown_flag_clone.store(true, Ordering::SeqCst);
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    let mut cycle_interval = interval(Duration::from_secs(interval_secs));

    info!("Starting trading loop...");

    loop {
        tokio::select! {
            _ = cycle_interval.tick() => {
                if shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = trader.run_cycle().await {
                    error!("Trading cycle error: {}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    trader.shutdown();
    info!("Paper trading session ended.");
    Ok(())
}
