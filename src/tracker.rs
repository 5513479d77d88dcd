//! Order handle tracking
//!
//! Mirrors the venue-resident entry and protective-stop orders and
//! enforces the at-most-one-resident-order invariant: a new entry may be
//! armed only when the prior handle is absent or terminal and no cancel is
//! awaiting confirmation. All venue calls here are fire-and-forget; state
//! changes land later through order/execution events.

use tracing::{debug, info, warn};

use crate::error::StrategyError;
use crate::risk::RiskContext;
use crate::types::{MarketPosition, OrderHandle, OrderState, OrderUpdate};
use crate::venue::{stop_signal_name, EntryOrderSpec, Venue};

pub struct OrderTracker {
    signal: String,
    entry: Option<OrderHandle>,
    stop: Option<OrderHandle>,
    risk: Option<RiskContext>,
    /// Set after a cancel request until the venue confirms a terminal
    /// state; re-arming is blocked meanwhile so a duplicate resident order
    /// cannot be created.
    cancel_pending: bool,
    /// Set once the entry fills; a completed round trip requires it.
    trade_was_live: bool,
}

impl OrderTracker {
    pub fn new(signal: impl Into<String>) -> Self {
        OrderTracker {
            signal: signal.into(),
            entry: None,
            stop: None,
            risk: None,
            cancel_pending: false,
            trade_was_live: false,
        }
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn entry(&self) -> Option<&OrderHandle> {
        self.entry.as_ref()
    }

    pub fn stop(&self) -> Option<&OrderHandle> {
        self.stop.as_ref()
    }

    /// Whether a new entry may be submitted now.
    pub fn can_arm(&self) -> bool {
        !self.cancel_pending && self.entry.as_ref().map_or(true, |h| h.is_terminal())
    }

    /// Declare the protective stop, submit the entry, and store the
    /// resulting handle together with the armed risk prices.
    ///
    /// The stop declaration goes out first: the venue associates it with
    /// the entry's signal name, and declaring before submission closes the
    /// race where a fast fill arrives with no stop registered.
    pub fn arm(
        &mut self,
        venue: &mut dyn Venue,
        spec: EntryOrderSpec,
        risk: RiskContext,
    ) -> Result<(), StrategyError> {
        if !self.can_arm() {
            return Err(StrategyError::AlreadyArmed);
        }

        venue.submit_stop_loss_declaration(&self.signal, risk.stop_price);
        let handle = venue.submit_entry(&spec);
        info!(
            signal = %self.signal,
            kind = ?handle.kind,
            entry = risk.entry_price,
            stop = risk.stop_price,
            risk = risk.risk_distance,
            "entry armed"
        );
        self.entry = Some(handle);
        self.risk = Some(risk);
        Ok(())
    }

    /// Mirror a venue order update onto the tracked handles.
    pub fn apply_order_update(&mut self, update: &OrderUpdate) {
        let incoming = &update.handle;

        if let Some(entry) = &mut self.entry {
            if entry.id == incoming.id {
                entry.state = incoming.state;
                match incoming.state {
                    OrderState::Rejected => {
                        // same recovery as Cancelled: clear and allow
                        // re-arming on the next qualifying bar
                        let err = StrategyError::OrderRejected(
                            update.error.clone().unwrap_or_else(|| "unspecified".into()),
                        );
                        warn!(signal = %self.signal, error = %err, "entry rejected");
                        self.cancel_pending = false;
                        if !self.trade_was_live {
                            self.risk = None;
                        }
                    }
                    OrderState::Cancelled => {
                        debug!(signal = %self.signal, "entry cancel confirmed");
                        self.cancel_pending = false;
                        if !self.trade_was_live {
                            self.risk = None;
                        }
                    }
                    OrderState::Filled => {
                        // a cancel may have raced the fill; the fill wins
                        self.cancel_pending = false;
                    }
                    _ => {}
                }
                return;
            }
        }

        if let Some(stop) = &mut self.stop {
            if stop.id == incoming.id {
                stop.state = incoming.state;
                return;
            }
        }

        // adopt the protective stop the venue attached for our signal
        if incoming.signal == stop_signal_name(&self.signal) && incoming.is_working() {
            if self.stop.as_ref().is_some_and(|s| s.is_working()) {
                warn!(signal = %incoming.signal, "second working stop reported");
            }
            debug!(signal = %incoming.signal, price = incoming.price, "stop handle adopted");
            self.stop = Some(incoming.clone());
        }
    }

    /// The entry filled; the trade is live and a later return to flat
    /// completes a round trip.
    pub fn on_entry_filled(&mut self) {
        self.trade_was_live = true;
    }

    /// The venue reports a flat position: clear the risk context and the
    /// stop handle, cancelling a stray stop the venue has not resolved.
    /// Returns true when a full round trip (fill then flat) just completed.
    pub fn on_flat_observed(&mut self, venue: &mut dyn Venue) -> bool {
        if let Some(stop) = self.stop.take() {
            if stop.is_working() {
                debug!(signal = %stop.signal, "cancelling stray working stop");
                venue.cancel_order(stop.id);
            }
        }
        self.risk = None;

        let completed = self.trade_was_live;
        self.trade_was_live = false;
        completed
    }

    /// Request a cancel of the working entry. Idempotent: repeated calls
    /// produce exactly one cancel request until the venue confirms.
    /// Returns whether a request was issued.
    pub fn cancel_entry_if_working(&mut self, venue: &mut dyn Venue) -> bool {
        if self.cancel_pending {
            return false;
        }
        match &self.entry {
            Some(entry) if entry.is_working() => {
                venue.cancel_order(entry.id);
                self.cancel_pending = true;
                true
            }
            _ => false,
        }
    }

    /// Risk prices of the live trade. Reading while flat is an invariant
    /// violation (stale-value bug class), surfaced as `StaleRiskRead`.
    pub fn active_risk(&self, position: MarketPosition) -> Result<&RiskContext, StrategyError> {
        if position.is_flat() {
            return Err(StrategyError::StaleRiskRead);
        }
        self.risk.as_ref().ok_or(StrategyError::StaleRiskRead)
    }
}
