//! Risk calculation
//!
//! Pure functions deriving entry price, stop price, and risk distance from
//! a completed signal bar, plus the fixed reward/risk exit test. No venue
//! access and no side effects; fully unit-testable.

use crate::error::StrategyError;
use crate::types::{Bar, TradeDirection};

/// Prices locked in when an entry is armed.
///
/// Stored from arming time, but only readable while the venue reports a
/// non-flat position; see [`crate::tracker::OrderTracker::active_risk`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskContext {
    pub entry_price: f64,
    pub stop_price: f64,
    pub risk_distance: f64,
}

/// Derive entry, stop, and risk distance from a signal bar.
///
/// Long: entry one tick above the high, stop one tick below the low.
/// Short is the mirror image.
pub fn arm_entry(bar: &Bar, direction: TradeDirection) -> Result<RiskContext, StrategyError> {
    let (entry_price, stop_price) = match direction {
        TradeDirection::Long => (bar.high + bar.tick_size, bar.low - bar.tick_size),
        TradeDirection::Short => (bar.low - bar.tick_size, bar.high + bar.tick_size),
    };
    let risk_distance = match direction {
        TradeDirection::Long => entry_price - stop_price,
        TradeDirection::Short => stop_price - entry_price,
    };
    if risk_distance <= 0.0 {
        return Err(StrategyError::InvalidRisk(risk_distance));
    }
    Ok(RiskContext {
        entry_price,
        stop_price,
        risk_distance,
    })
}

/// True once the close has moved `reward_multiple` times the risk distance
/// past the entry price.
pub fn target_reached(
    ctx: &RiskContext,
    close: f64,
    direction: TradeDirection,
    reward_multiple: f64,
) -> bool {
    let reward = match direction {
        TradeDirection::Long => close - ctx.entry_price,
        TradeDirection::Short => ctx.entry_price - close,
    };
    reward >= ctx.risk_distance * reward_multiple
}

/// True when price has already traded through the intended trigger, so a
/// stop order would fire immediately (or reject at some venues). Callers
/// fall back to a resting limit at the original level.
pub fn traded_through(close: f64, entry_price: f64, direction: TradeDirection) -> bool {
    match direction {
        TradeDirection::Long => close > entry_price,
        TradeDirection::Short => close < entry_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn bar(open: f64, high: f64, low: f64, close: f64, tick_size: f64) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            tick_size,
        }
    }

    #[test]
    fn test_long_arm_from_red_bar() {
        let b = bar(100.0, 102.0, 99.0, 98.0, 0.25);
        let ctx = arm_entry(&b, TradeDirection::Long).unwrap();
        assert_relative_eq!(ctx.entry_price, 102.25);
        assert_relative_eq!(ctx.stop_price, 98.75);
        assert_relative_eq!(ctx.risk_distance, 3.5);
    }

    #[test]
    fn test_short_arm_is_mirrored() {
        let b = bar(100.0, 102.0, 99.0, 101.0, 0.25);
        let ctx = arm_entry(&b, TradeDirection::Short).unwrap();
        assert_relative_eq!(ctx.entry_price, 98.75);
        assert_relative_eq!(ctx.stop_price, 102.25);
        assert_relative_eq!(ctx.risk_distance, 3.5);
    }

    #[test]
    fn test_invalid_risk_rejected() {
        // degenerate bar with no range and no tick padding
        let b = bar(100.0, 100.0, 100.0, 100.0, 0.0);
        assert!(matches!(
            arm_entry(&b, TradeDirection::Long),
            Err(StrategyError::InvalidRisk(_))
        ));
    }

    #[test]
    fn test_target_reached_one_to_one() {
        let ctx = RiskContext {
            entry_price: 102.25,
            stop_price: 98.75,
            risk_distance: 3.5,
        };
        assert!(target_reached(&ctx, 105.75, TradeDirection::Long, 1.0));
        assert!(!target_reached(&ctx, 105.74, TradeDirection::Long, 1.0));
    }

    #[test]
    fn test_target_respects_reward_multiple() {
        let ctx = RiskContext {
            entry_price: 102.25,
            stop_price: 98.75,
            risk_distance: 3.5,
        };
        assert!(!target_reached(&ctx, 105.75, TradeDirection::Long, 2.0));
        assert!(target_reached(&ctx, 109.25, TradeDirection::Long, 2.0));
    }

    #[test]
    fn test_target_reached_short() {
        let ctx = RiskContext {
            entry_price: 98.75,
            stop_price: 102.25,
            risk_distance: 3.5,
        };
        assert!(target_reached(&ctx, 95.25, TradeDirection::Short, 1.0));
        assert!(!target_reached(&ctx, 95.5, TradeDirection::Short, 1.0));
    }

    #[test]
    fn test_traded_through_detection() {
        assert!(traded_through(103.0, 102.25, TradeDirection::Long));
        assert!(!traded_through(102.0, 102.25, TradeDirection::Long));
        assert!(traded_through(98.0, 98.75, TradeDirection::Short));
        assert!(!traded_through(99.0, 98.75, TradeDirection::Short));
    }
}
