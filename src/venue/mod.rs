//! Brokerage venue interface
//!
//! The strategy core never talks to an exchange directly. It issues
//! fire-and-forget order commands through this trait and observes every
//! result later through the order/execution event stream; no venue call
//! returns an outcome synchronously. Order state is owned by the venue and
//! only mirrored locally.

pub mod paper;

pub use paper::PaperVenue;

use crate::types::{MarketPosition, OrderHandle, OrderId, OrderKind, Side, VenueEvent};

/// Parameters for a new entry order.
#[derive(Debug, Clone)]
pub struct EntryOrderSpec {
    pub signal: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Trigger price for stop kinds, limit price for `Limit`.
    pub price: f64,
    /// Cap price for `StopLimit`.
    pub limit_price: Option<f64>,
    pub quantity: f64,
}

/// Signal name the venue attaches to the protective stop it creates for an
/// entry signal.
pub fn stop_signal_name(signal: &str) -> String {
    format!("{}_stop", signal)
}

/// Signal name the venue uses for position-exit orders.
pub fn exit_signal_name(signal: &str) -> String {
    format!("{}_exit", signal)
}

pub trait Venue {
    /// Submit an entry order. The returned handle is a local mirror in
    /// Submitted state; the authoritative lifecycle arrives via events.
    fn submit_entry(&mut self, spec: &EntryOrderSpec) -> OrderHandle;

    /// Declare the protective stop for a signal. Issued before the entry
    /// is submitted; the venue attaches the stop when the entry fills, so
    /// a fast fill can never arrive before the stop is registered.
    fn submit_stop_loss_declaration(&mut self, signal: &str, stop_price: f64);

    /// Request a cancel. Advisory: the order is gone only when the
    /// corresponding Cancelled (or Filled) event is observed.
    fn cancel_order(&mut self, order_id: OrderId);

    /// Close the open position for a signal at market.
    fn exit_position(&mut self, signal: &str);

    /// Authoritative account position.
    fn market_position(&self) -> MarketPosition;

    /// Drain queued order/execution events in venue order.
    fn drain_events(&mut self) -> Vec<VenueEvent>;
}
