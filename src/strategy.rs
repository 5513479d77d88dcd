//! Breakout strategy controller
//!
//! One state machine drives both callback paths: bar-close ticks from the
//! feed and order/execution events from the venue. Per tick the checks run
//! in a fixed order (rotation gate, daily flatten, reward exit, window
//! gate, entry arming) because reordering them changes observable
//! behavior: an entry must never be armed on the tick a flatten fires.
//!
//! The entry signal is the simplest breakout setup: a red bar arms a long
//! stop entry one tick above its high (green bar and mirrored prices for
//! the short variant), with the protective stop on the far side of the bar
//! and a fixed reward/risk exit.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::StrategyError;
use crate::flatten::FlattenScheduler;
use crate::risk::{self, RiskContext};
use crate::rotation::{FileOwnerStore, OwnerStore, Role, RotationArbiter};
use crate::tracker::OrderTracker;
use crate::types::{Bar, OrderKind, OrderState, TradeDirection, VenueEvent};
use crate::venue::{EntryOrderSpec, Venue};
use crate::window::{near_boundary, WindowGate};

/// Tolerance when comparing a resting trigger to a newly desired price.
const PRICE_EPSILON: f64 = 1e-7;

fn default_signal() -> String {
    "Long1".to_string()
}

fn default_reward_multiple() -> f64 {
    1.0
}

fn default_entry_kind() -> OrderKind {
    OrderKind::StopLimit
}

fn default_quantity() -> f64 {
    1.0
}

fn default_min_bars() -> usize {
    5
}

fn default_cancel_tolerance() -> Option<f64> {
    Some(4.0)
}

/// Strategy parameters, embedded in the deployment config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutConfig {
    /// Signal name orders are tagged with at the venue.
    #[serde(default = "default_signal")]
    pub signal: String,
    pub direction: TradeDirection,
    /// Reward target as a multiple of the armed risk distance.
    #[serde(default = "default_reward_multiple")]
    pub reward_multiple: f64,
    /// Resting order kind for un-slipped entries (StopMarket or StopLimit).
    #[serde(default = "default_entry_kind")]
    pub entry_kind: OrderKind,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Completed bars required before trading starts.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
    /// When set, a working entry outside the trade window is cancelled only
    /// once price is within this many ticks of its trigger; when absent it
    /// is cancelled on the first forbidden bar.
    #[serde(default = "default_cancel_tolerance")]
    pub cancel_tolerance_ticks: Option<f64>,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        BreakoutConfig {
            signal: default_signal(),
            direction: TradeDirection::Long,
            reward_multiple: default_reward_multiple(),
            entry_kind: default_entry_kind(),
            quantity: default_quantity(),
            min_bars: default_min_bars(),
            cancel_tolerance_ticks: default_cancel_tolerance(),
        }
    }
}

struct Rotation {
    arbiter: RotationArbiter,
    store: Box<dyn OwnerStore>,
}

/// Top-level strategy state machine.
pub struct BreakoutStrategy {
    config: BreakoutConfig,
    window: Option<WindowGate>,
    flatten: Option<FlattenScheduler>,
    rotation: Option<Rotation>,
    tracker: OrderTracker,
    /// Entry computed during a forbidden window, waiting for release.
    delayed: Option<RiskContext>,
    bars_seen: usize,
    last_window_state: Option<bool>,
}

impl BreakoutStrategy {
    pub fn new(config: BreakoutConfig) -> Self {
        let tracker = OrderTracker::new(config.signal.clone());
        BreakoutStrategy {
            config,
            window: None,
            flatten: None,
            rotation: None,
            tracker,
            delayed: None,
            bars_seen: 0,
            last_window_state: None,
        }
    }

    pub fn with_window(mut self, gate: WindowGate) -> Self {
        self.window = Some(gate);
        self
    }

    pub fn with_flatten(mut self, scheduler: FlattenScheduler) -> Self {
        self.flatten = Some(scheduler);
        self
    }

    pub fn with_rotation(mut self, arbiter: RotationArbiter, store: Box<dyn OwnerStore>) -> Self {
        self.rotation = Some(Rotation { arbiter, store });
        self
    }

    /// Build the full controller from a deployment config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut strategy = BreakoutStrategy::new(config.strategy.clone());
        if let Some(windows) = &config.windows {
            strategy = strategy.with_window(windows.build()?);
        }
        if let Some(flatten) = &config.flatten {
            strategy = strategy.with_flatten(flatten.build()?);
        }
        if let Some(rotation) = &config.rotation {
            let store = FileOwnerStore::new(&rotation.token_path);
            store.ensure_initialized()?;
            strategy = strategy.with_rotation(
                RotationArbiter::new(rotation.instance_index, rotation.instances),
                Box::new(store),
            );
        }
        Ok(strategy)
    }

    pub fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }

    /// Bar-close tick. Fixed check order; see module docs.
    pub fn on_bar_close(&mut self, bar: &Bar, venue: &mut dyn Venue) {
        self.bars_seen += 1;

        // rotation gate: a waiting instance only re-reads the token
        if let Some(rotation) = &self.rotation {
            if rotation.arbiter.poll(rotation.store.as_ref()) == Role::Waiting {
                return;
            }
        }

        // daily flatten; trading stays suspended for the whole cutoff
        if let Some(flatten) = &mut self.flatten {
            if flatten.in_cutoff(bar.timestamp) {
                if flatten.should_fire(bar.timestamp) {
                    flatten.mark_fired(bar.timestamp);
                    info!(time = %bar.timestamp, "daily flatten, clearing position and orders");
                    if !venue.market_position().is_flat() {
                        venue.exit_position(&self.config.signal);
                    }
                    self.tracker.cancel_entry_if_working(venue);
                    if self.delayed.take().is_some() {
                        info!("dropping delayed entry at daily flatten");
                    }
                }
                return;
            }
        }

        if self.bars_seen < self.config.min_bars {
            return;
        }

        let position = venue.market_position();

        // fixed reward/risk exit
        if !position.is_flat() {
            match self.tracker.active_risk(position) {
                Ok(ctx) => {
                    if risk::target_reached(
                        ctx,
                        bar.close,
                        self.config.direction,
                        self.config.reward_multiple,
                    ) {
                        info!(
                            close = bar.close,
                            entry = ctx.entry_price,
                            risk = ctx.risk_distance,
                            "reward target reached, exiting position"
                        );
                        venue.exit_position(&self.config.signal);
                    }
                }
                Err(e) => warn!(error = %e, "position open without risk context"),
            }
            return;
        }

        // trade window applies to new entries only
        if let Some(window) = &self.window {
            let admitted = window.admits(bar.time_of_day());
            if self.last_window_state != Some(admitted) {
                info!(admitted, time = %bar.time_of_day(), "trade window changed");
                self.last_window_state = Some(admitted);
            }
            if !admitted {
                self.cancel_outside_window(bar, venue);
                if self.is_signal_bar(bar) {
                    match risk::arm_entry(bar, self.config.direction) {
                        Ok(ctx) => {
                            info!(
                                entry = ctx.entry_price,
                                stop = ctx.stop_price,
                                "signal inside forbidden window, delaying entry"
                            );
                            self.delayed = Some(ctx);
                        }
                        Err(e) => debug!(error = %e, "skipping delayed entry"),
                    }
                }
                return;
            }
            if let Some(ctx) = self.delayed.take() {
                info!(entry = ctx.entry_price, "window open, releasing delayed entry");
                self.submit_entry(ctx, bar, venue);
                return;
            }
        }

        if !self.is_signal_bar(bar) {
            return;
        }

        let ctx = match risk::arm_entry(bar, self.config.direction) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "signal bar produced no tradable risk");
                return;
            }
        };

        if let Some(existing) = self.tracker.entry() {
            if existing.is_working() {
                if (existing.price - ctx.entry_price).abs() < PRICE_EPSILON {
                    debug!(price = existing.price, "entry already resting at desired trigger");
                } else {
                    // replace: request the cancel now, re-arm only after
                    // the venue confirms on a later qualifying bar
                    debug!(
                        old = existing.price,
                        new = ctx.entry_price,
                        "trigger moved, cancelling stale entry"
                    );
                    self.tracker.cancel_entry_if_working(venue);
                }
                return;
            }
        }

        self.submit_entry(ctx, bar, venue);
    }

    /// Venue event callback. Never overlaps a bar-close tick.
    pub fn on_venue_event(&mut self, event: &VenueEvent, venue: &mut dyn Venue) {
        match event {
            VenueEvent::Order(update) => self.tracker.apply_order_update(update),
            VenueEvent::Execution(exec) => {
                if exec.handle.signal == self.config.signal
                    && exec.handle.state == OrderState::Filled
                    && !exec.resulting_position.is_flat()
                {
                    info!(price = exec.fill_price, "entry filled, trade is live");
                    self.tracker.on_entry_filled();
                }
                if exec.resulting_position.is_flat() {
                    let round_trip = self.tracker.on_flat_observed(venue);
                    if round_trip {
                        if let Some(rotation) = &self.rotation {
                            if let Err(e) = rotation.arbiter.rotate(rotation.store.as_ref()) {
                                warn!(error = %e, "rotation handoff failed, retaining control");
                            }
                        }
                    }
                }
            }
        }
    }

    fn is_signal_bar(&self, bar: &Bar) -> bool {
        match self.config.direction {
            TradeDirection::Long => bar.is_red(),
            TradeDirection::Short => bar.is_green(),
        }
    }

    /// Cancel a working entry left over from inside the window once price
    /// gets close enough to its trigger to risk an unwanted fill.
    fn cancel_outside_window(&mut self, bar: &Bar, venue: &mut dyn Venue) {
        let Some(entry) = self.tracker.entry() else {
            return;
        };
        if !entry.is_working() {
            return;
        }
        let should_cancel = match self.config.cancel_tolerance_ticks {
            Some(ticks) => near_boundary(bar.close, entry.price, ticks * bar.tick_size),
            None => true,
        };
        if should_cancel {
            info!(
                trigger = entry.price,
                close = bar.close,
                "outside trade window, cancelling pending entry"
            );
            self.tracker.cancel_entry_if_working(venue);
        }
    }

    /// Choose the order kind and submit. The slippage comparison happens
    /// exactly once, here: if the close already traded through the trigger
    /// a stop order would fire immediately at a worse price (or reject),
    /// so a resting limit at the original level is used instead.
    fn submit_entry(&mut self, ctx: RiskContext, bar: &Bar, venue: &mut dyn Venue) {
        let slipped = risk::traded_through(bar.close, ctx.entry_price, self.config.direction);
        let (kind, limit_price) = if slipped {
            info!(
                close = bar.close,
                trigger = ctx.entry_price,
                "price through trigger, falling back to limit entry"
            );
            (OrderKind::Limit, None)
        } else {
            match self.config.entry_kind {
                OrderKind::StopLimit => (OrderKind::StopLimit, Some(ctx.entry_price)),
                kind => (kind, None),
            }
        };

        let spec = EntryOrderSpec {
            signal: self.config.signal.clone(),
            side: self.config.direction.entry_side(),
            kind,
            price: ctx.entry_price,
            limit_price,
            quantity: self.config.quantity,
        };

        match self.tracker.arm(venue, spec, ctx) {
            Ok(()) => {}
            // re-entrancy guard: skip silently
            Err(StrategyError::AlreadyArmed) => debug!("arm skipped, entry already resident"),
            Err(e) => warn!(error = %e, "arming failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketPosition, OrderState};
    use crate::venue::PaperVenue;
    use chrono::{TimeZone, Utc};

    fn bar_at(h: u32, m: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap(),
            open,
            high,
            low,
            close,
            tick_size: 0.25,
        }
    }

    fn red_bar_at(h: u32, m: u32) -> Bar {
        bar_at(h, m, 100.0, 102.0, 99.0, 98.0)
    }

    fn warmed_up(config: BreakoutConfig) -> BreakoutStrategy {
        let mut strategy = BreakoutStrategy::new(config);
        strategy.bars_seen = 10;
        strategy
    }

    fn drive_events(strategy: &mut BreakoutStrategy, venue: &mut PaperVenue) {
        for event in venue.drain_events() {
            strategy.on_venue_event(&event, venue);
        }
    }

    #[test]
    fn test_red_bar_arms_stop_entry() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        drive_events(&mut strategy, &mut venue);

        let entry = strategy.tracker().entry().unwrap();
        assert_eq!(entry.kind, OrderKind::StopLimit);
        assert_eq!(entry.price, 102.25);
        assert!(entry.is_working());
    }

    #[test]
    fn test_green_bar_does_not_arm_long() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&bar_at(11, 0, 100.0, 102.0, 99.0, 101.0), &mut venue);
        assert!(strategy.tracker().entry().is_none());
        assert_eq!(venue.open_order_count(), 0);
    }

    #[test]
    fn test_warmup_blocks_entries() {
        let mut venue = PaperVenue::new();
        let mut strategy = BreakoutStrategy::new(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        assert_eq!(venue.open_order_count(), 0);
    }

    #[test]
    fn test_same_price_entry_is_kept() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        drive_events(&mut strategy, &mut venue);
        let first_id = strategy.tracker().entry().unwrap().id;

        // identical red bar: same trigger, keep the resting order
        strategy.on_bar_close(&red_bar_at(11, 30), &mut venue);
        drive_events(&mut strategy, &mut venue);
        assert_eq!(strategy.tracker().entry().unwrap().id, first_id);
        assert_eq!(venue.cancel_requests(), 0);
    }

    #[test]
    fn test_moved_trigger_cancels_then_rearms() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        drive_events(&mut strategy, &mut venue);
        let first_id = strategy.tracker().entry().unwrap().id;

        // lower red bar moves the desired trigger: cancel, no new order yet
        strategy.on_bar_close(&bar_at(11, 30, 99.0, 100.0, 97.0, 97.5), &mut venue);
        assert_eq!(venue.cancel_requests(), 1);
        assert_eq!(strategy.tracker().entry().unwrap().id, first_id);
        drive_events(&mut strategy, &mut venue);

        // cancel confirmed; the next signal bar re-arms at its price
        strategy.on_bar_close(&bar_at(12, 0, 99.0, 100.0, 97.0, 97.5), &mut venue);
        drive_events(&mut strategy, &mut venue);
        let entry = strategy.tracker().entry().unwrap();
        assert_ne!(entry.id, first_id);
        assert_eq!(entry.price, 100.25);
    }

    #[test]
    fn test_waiting_instance_touches_nothing() {
        struct FixedStore(u32);
        impl OwnerStore for FixedStore {
            fn read_owner(&self) -> std::io::Result<u32> {
                Ok(self.0)
            }
            fn write_owner(&self, _owner: u32) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default())
            .with_rotation(RotationArbiter::new(2, 3), Box::new(FixedStore(1)));

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        assert_eq!(venue.open_order_count(), 0);
        assert!(strategy.tracker().entry().is_none());
    }

    #[test]
    fn test_slipped_release_uses_limit() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        // release a stored entry on a bar whose close is already above the
        // stored trigger
        let ctx = RiskContext {
            entry_price: 102.25,
            stop_price: 98.75,
            risk_distance: 3.5,
        };
        let release_bar = bar_at(11, 0, 102.5, 103.5, 102.4, 103.0);
        strategy.submit_entry(ctx, &release_bar, &mut venue);
        drive_events(&mut strategy, &mut venue);

        let entry = strategy.tracker().entry().unwrap();
        assert_eq!(entry.kind, OrderKind::Limit);
        assert_eq!(entry.price, 102.25);
    }

    #[test]
    fn test_exit_fires_at_target() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        drive_events(&mut strategy, &mut venue);

        venue.on_bar(&bar_at(11, 30, 102.0, 103.0, 101.5, 102.5));
        drive_events(&mut strategy, &mut venue);
        assert_eq!(venue.market_position(), MarketPosition::Long);

        // close short of the 1:1 target holds the position
        strategy.on_bar_close(&bar_at(12, 0, 102.5, 105.0, 102.0, 104.0), &mut venue);
        drive_events(&mut strategy, &mut venue);
        assert_eq!(venue.market_position(), MarketPosition::Long);

        // reward 3.5 at close 105.75 triggers the exit
        strategy.on_bar_close(&bar_at(12, 30, 104.0, 106.0, 103.5, 105.75), &mut venue);
        drive_events(&mut strategy, &mut venue);
        assert_eq!(venue.market_position(), MarketPosition::Flat);
        assert!(strategy.tracker().stop().is_none());
        assert_eq!(venue.open_order_count(), 0);
    }

    #[test]
    fn test_entry_states_mirror_venue() {
        let mut venue = PaperVenue::new();
        let mut strategy = warmed_up(BreakoutConfig::default());

        strategy.on_bar_close(&red_bar_at(11, 0), &mut venue);
        drive_events(&mut strategy, &mut venue);
        assert_eq!(
            strategy.tracker().entry().unwrap().state,
            OrderState::Working
        );

        venue.on_bar(&bar_at(11, 30, 102.0, 103.0, 101.5, 102.5));
        drive_events(&mut strategy, &mut venue);
        assert_eq!(
            strategy.tracker().entry().unwrap().state,
            OrderState::Filled
        );
        assert!(strategy.tracker().stop().is_some());
    }
}
