//! Breakout trading strategy engine
//!
//! Single-instrument, single-position breakout trading built around an
//! order-lifecycle state machine: at most one resident entry order and one
//! protective stop per instance, kept consistent across asynchronous
//! fill/cancel notifications. Around that core sit time-window admission
//! control (allow- or deny-lists that can delay or cancel entries), a
//! fixed reward/risk exit, a once-per-day flatten, and optional rotation
//! of trading rights across cooperating instances through a shared token
//! file.
//!
//! The venue is a collaborator behind the [`venue::Venue`] trait: every
//! order command is fire-and-forget and results are observed through the
//! order/execution event streams. [`venue::PaperVenue`] is a bar-driven
//! simulation of that contract used by the paper trading loop and the
//! integration tests.
//!
//! # Example
//! ```no_run
//! use breakout_strategies::venue::PaperVenue;
//! use breakout_strategies::{BreakoutStrategy, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("configs/btcusdt_30m_long.json")?;
//!     let mut strategy = BreakoutStrategy::from_config(&config)?;
//!     let mut venue = PaperVenue::new();
//!     // for each completed bar:
//!     //   venue.on_bar(&bar);
//!     //   for event in venue.drain_events() { strategy.on_venue_event(&event, &mut venue); }
//!     //   strategy.on_bar_close(&bar, &mut venue);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod flatten;
pub mod risk;
pub mod rotation;
pub mod strategy;
pub mod tracker;
pub mod types;
pub mod venue;
pub mod window;

pub use config::Config;
pub use error::StrategyError;
pub use strategy::{BreakoutConfig, BreakoutStrategy};
pub use types::*;
