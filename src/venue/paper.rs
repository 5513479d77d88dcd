//! Simulated venue
//!
//! Fills resident orders against completed bars using intra-bar trigger
//! rules and feeds the same order/execution event streams a real venue
//! would. Used by the paper trading loop and the integration tests.
//!
//! A protective stop declared for a signal is attached as a real resident
//! order the moment the entry fills; it becomes eligible to trigger from
//! the next bar on.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::types::{
    next_order_id, Bar, ExecutionUpdate, MarketPosition, OrderHandle, OrderId, OrderKind,
    OrderState, OrderUpdate, Side, VenueEvent,
};
use crate::venue::{exit_signal_name, stop_signal_name, EntryOrderSpec, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderRole {
    Entry,
    Protective,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    handle: OrderHandle,
    quantity: f64,
    role: OrderRole,
}

/// In-process venue simulation with bar-driven fills.
pub struct PaperVenue {
    orders: Vec<PaperOrder>,
    stop_declarations: HashMap<String, f64>,
    position: MarketPosition,
    position_quantity: f64,
    last_price: f64,
    now: DateTime<Utc>,
    events: VecDeque<VenueEvent>,
    cancel_requests: usize,
    reject_next: bool,
}

impl PaperVenue {
    pub fn new() -> Self {
        PaperVenue {
            orders: Vec::new(),
            stop_declarations: HashMap::new(),
            position: MarketPosition::Flat,
            position_quantity: 0.0,
            last_price: 0.0,
            now: Utc::now(),
            events: VecDeque::new(),
            cancel_requests: 0,
            reject_next: false,
        }
    }

    /// Number of orders currently resident at the venue.
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    /// Resident order handles, for inspection.
    pub fn open_orders(&self) -> Vec<OrderHandle> {
        self.orders.iter().map(|o| o.handle.clone()).collect()
    }

    /// Total cancel requests received, confirmed or not.
    pub fn cancel_requests(&self) -> usize {
        self.cancel_requests
    }

    /// Decline the next submitted entry with a Rejected update.
    pub fn reject_next_submission(&mut self) {
        self.reject_next = true;
    }

    /// Process a completed bar: trigger and fill resident orders, attach
    /// declared stops on entry fills.
    pub fn on_bar(&mut self, bar: &Bar) {
        self.now = bar.timestamp;
        self.last_price = bar.close;

        // only orders resident before this bar are eligible; a stop
        // attached during the bar waits for the next one
        let resident: Vec<OrderId> = self.orders.iter().map(|o| o.handle.id).collect();
        for id in resident {
            let Some(index) = self.orders.iter().position(|o| o.handle.id == id) else {
                continue;
            };
            let Some(price) = fill_price(&self.orders[index].handle, bar) else {
                continue;
            };
            let order = self.orders.remove(index);
            self.fill(order, price);
        }
    }

    fn fill(&mut self, mut order: PaperOrder, fill_price: f64) {
        order.handle.state = OrderState::Filled;
        self.push_order_update(&order.handle, order.quantity, fill_price, None);

        match order.role {
            OrderRole::Entry => {
                self.position = match order.handle.side {
                    Side::Buy => MarketPosition::Long,
                    Side::Sell => MarketPosition::Short,
                };
                self.position_quantity = order.quantity;
                info!(
                    signal = %order.handle.signal,
                    price = fill_price,
                    "entry filled"
                );
                self.push_execution(&order.handle, fill_price, order.quantity);

                if let Some(stop_price) = self.stop_declarations.remove(&order.handle.signal) {
                    self.attach_protective_stop(&order.handle, stop_price, order.quantity);
                }
            }
            OrderRole::Protective => {
                self.position = MarketPosition::Flat;
                self.position_quantity = 0.0;
                info!(
                    signal = %order.handle.signal,
                    price = fill_price,
                    "protective stop filled"
                );
                self.push_execution(&order.handle, fill_price, order.quantity);
            }
        }
    }

    fn attach_protective_stop(&mut self, entry: &OrderHandle, stop_price: f64, quantity: f64) {
        let handle = OrderHandle {
            id: next_order_id(),
            signal: stop_signal_name(&entry.signal),
            side: entry.side.opposite(),
            kind: OrderKind::StopMarket,
            price: stop_price,
            limit_price: None,
            state: OrderState::Working,
        };
        debug!(signal = %handle.signal, price = stop_price, "protective stop attached");
        self.push_order_update(&handle, 0.0, 0.0, None);
        self.orders.push(PaperOrder {
            handle,
            quantity,
            role: OrderRole::Protective,
        });
    }

    fn push_order_update(
        &mut self,
        handle: &OrderHandle,
        filled_quantity: f64,
        average_fill_price: f64,
        error: Option<String>,
    ) {
        self.events.push_back(VenueEvent::Order(OrderUpdate {
            handle: handle.clone(),
            filled_quantity,
            average_fill_price,
            error,
        }));
    }

    fn push_execution(&mut self, handle: &OrderHandle, fill_price: f64, fill_quantity: f64) {
        self.events.push_back(VenueEvent::Execution(ExecutionUpdate {
            handle: handle.clone(),
            fill_price,
            fill_quantity,
            resulting_position: self.position,
            timestamp: self.now,
        }));
    }
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl Venue for PaperVenue {
    fn submit_entry(&mut self, spec: &EntryOrderSpec) -> OrderHandle {
        let mut handle = OrderHandle {
            id: next_order_id(),
            signal: spec.signal.clone(),
            side: spec.side,
            kind: spec.kind,
            price: spec.price,
            limit_price: spec.limit_price,
            state: OrderState::Submitted,
        };
        self.push_order_update(&handle, 0.0, 0.0, None);

        if self.reject_next {
            self.reject_next = false;
            handle.state = OrderState::Rejected;
            warn!(signal = %spec.signal, "entry rejected");
            self.push_order_update(&handle, 0.0, 0.0, Some("rejected by venue".to_string()));
            handle.state = OrderState::Submitted;
            return handle;
        }

        let mut resident = handle.clone();
        resident.state = OrderState::Working;
        self.push_order_update(&resident, 0.0, 0.0, None);
        self.orders.push(PaperOrder {
            handle: resident,
            quantity: spec.quantity,
            role: OrderRole::Entry,
        });
        handle
    }

    fn submit_stop_loss_declaration(&mut self, signal: &str, stop_price: f64) {
        debug!(signal, price = stop_price, "stop loss declared");
        self.stop_declarations.insert(signal.to_string(), stop_price);
    }

    fn cancel_order(&mut self, order_id: OrderId) {
        self.cancel_requests += 1;
        let Some(index) = self.orders.iter().position(|o| o.handle.id == order_id) else {
            debug!(order_id, "cancel for unknown or settled order ignored");
            return;
        };
        let mut order = self.orders.remove(index);
        order.handle.state = OrderState::Cancelled;
        info!(signal = %order.handle.signal, order_id, "order cancelled");
        let handle = order.handle;
        self.push_order_update(&handle, 0.0, 0.0, None);
    }

    fn exit_position(&mut self, signal: &str) {
        if self.position.is_flat() {
            debug!(signal, "exit requested while flat, nothing to do");
            return;
        }
        let side = match self.position {
            MarketPosition::Long => Side::Sell,
            MarketPosition::Short => Side::Buy,
            MarketPosition::Flat => unreachable!(),
        };
        let handle = OrderHandle {
            id: next_order_id(),
            signal: exit_signal_name(signal),
            side,
            kind: OrderKind::Market,
            price: self.last_price,
            limit_price: None,
            state: OrderState::Filled,
        };
        let quantity = self.position_quantity;
        self.position = MarketPosition::Flat;
        self.position_quantity = 0.0;
        info!(signal = %handle.signal, price = self.last_price, "position exited");
        self.push_order_update(&handle, quantity, self.last_price, None);
        let price = self.last_price;
        self.push_execution(&handle, price, quantity);
    }

    fn market_position(&self) -> MarketPosition {
        self.position
    }

    fn drain_events(&mut self) -> Vec<VenueEvent> {
        self.events.drain(..).collect()
    }
}

/// Intra-bar trigger rules. Stop kinds trigger when the bar trades through
/// the trigger price; limits fill when the bar trades at or better. The
/// strategy submits stop-limits with cap equal to trigger, so a triggered
/// stop-limit fills at its cap.
fn fill_price(handle: &OrderHandle, bar: &Bar) -> Option<f64> {
    match (handle.side, handle.kind) {
        (Side::Buy, OrderKind::StopMarket) if bar.high >= handle.price => Some(handle.price),
        (Side::Buy, OrderKind::StopLimit) if bar.high >= handle.price => {
            Some(handle.limit_price.unwrap_or(handle.price))
        }
        (Side::Buy, OrderKind::Limit) if bar.low <= handle.price => Some(handle.price),
        (Side::Sell, OrderKind::StopMarket) if bar.low <= handle.price => Some(handle.price),
        (Side::Sell, OrderKind::StopLimit) if bar.low <= handle.price => {
            Some(handle.limit_price.unwrap_or(handle.price))
        }
        (Side::Sell, OrderKind::Limit) if bar.high >= handle.price => Some(handle.price),
        (_, OrderKind::Market) => Some(bar.open),
        _ => None,
    }
}
