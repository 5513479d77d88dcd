//! Core data types used across the trading system

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Completed OHLC bar delivered by the feed on period close.
///
/// Timestamps are the period end in the feed's session clock; time windows
/// and the flatten cutoff are configured against the same clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Minimum price increment of the instrument, stamped by the feed.
    pub tick_size: f64,
}

impl Bar {
    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Which breakout variant a deployment trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    pub fn entry_side(self) -> Side {
        match self {
            TradeDirection::Long => Side::Buy,
            TradeDirection::Short => Side::Sell,
        }
    }
}

/// Account position state. Sourced from the venue, authoritative over any
/// locally cached flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPosition {
    Flat,
    Long,
    Short,
}

impl MarketPosition {
    pub fn is_flat(self) -> bool {
        self == MarketPosition::Flat
    }
}

/// Order kind, determining trigger semantics at the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Converts to market when the trigger price trades.
    StopMarket,
    /// Converts to a limit order at the cap price when the trigger trades.
    StopLimit,
    /// Fills at the limit price or better.
    Limit,
    /// Fills immediately; used by venue-side position exits.
    Market,
}

/// Order state machine, owned by the venue and mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Submitted,
    Working,
    Accepted,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderState {
    /// Order can no longer fill or be cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }

    /// Order is resident at the venue and may still fill.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            OrderState::Submitted | OrderState::Working | OrderState::Accepted
        )
    }
}

/// Order ID type - u64 for performance
pub type OrderId = u64;

/// Atomic counter for fast order ID generation
static ORDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate next order ID (thread-safe, lock-free)
pub fn next_order_id() -> OrderId {
    ORDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Local mirror of a venue-resident order.
///
/// The venue owns the real order; this handle carries the requested
/// parameters and the last observed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: OrderId,
    /// Signal name the order is tied to at the venue.
    pub signal: String,
    pub side: Side,
    pub kind: OrderKind,
    /// Trigger price for stop kinds, limit price for `Limit`.
    pub price: f64,
    /// Cap price for `StopLimit`.
    pub limit_price: Option<f64>,
    pub state: OrderState,
}

impl OrderHandle {
    pub fn is_working(&self) -> bool {
        self.state.is_working()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Order state change notification from the venue.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    /// Snapshot of the order carrying its new state.
    pub handle: OrderHandle,
    pub filled_quantity: f64,
    pub average_fill_price: f64,
    pub error: Option<String>,
}

/// Execution (fill) notification from the venue.
#[derive(Debug, Clone)]
pub struct ExecutionUpdate {
    pub handle: OrderHandle,
    pub fill_price: f64,
    pub fill_quantity: f64,
    /// Account position after this execution.
    pub resulting_position: MarketPosition,
    pub timestamp: DateTime<Utc>,
}

/// Entry in the serialized venue event stream.
#[derive(Debug, Clone)]
pub enum VenueEvent {
    Order(OrderUpdate),
    Execution(ExecutionUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_generation() {
        let id1 = next_order_id();
        let id2 = next_order_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_order_state_classes() {
        assert!(OrderState::Working.is_working());
        assert!(OrderState::Submitted.is_working());
        assert!(OrderState::Accepted.is_working());
        assert!(!OrderState::Filled.is_working());

        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(!OrderState::Working.is_terminal());
    }

    #[test]
    fn test_bar_color() {
        let bar = Bar {
            timestamp: Utc::now(),
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 98.0,
            tick_size: 0.25,
        };
        assert!(bar.is_red());
        assert!(!bar.is_green());
    }

    #[test]
    fn test_direction_sides() {
        assert_eq!(TradeDirection::Long.entry_side(), Side::Buy);
        assert_eq!(TradeDirection::Short.entry_side(), Side::Sell);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }
}
