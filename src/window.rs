//! Trading-time admission control
//!
//! Decides whether new entries may be placed at a given time of day. Two
//! explicit modes: an allow-list admits only inside its intervals, a
//! deny-list forbids new entries inside its intervals and admits everywhere
//! else. Existing positions are never affected by the gate.
//!
//! All interval bounds are half-open `[start, end)`. An end at or before
//! the start wraps past midnight, so `23:30-00:00` covers the last half
//! hour of the day.

use anyhow::{bail, Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Admission semantics of the configured interval set.
///
/// The mode is declared in configuration, never inferred from the data: an
/// empty allow-list admits nothing, an empty deny-list forbids nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
enum Table {
    Intervals(Vec<(NaiveTime, NaiveTime)>),
    Slots { width_minutes: u32, flags: Vec<bool> },
}

/// Time-of-day gate for new entries. Immutable after configuration load.
#[derive(Debug, Clone)]
pub struct WindowGate {
    mode: WindowMode,
    table: Table,
}

impl WindowGate {
    pub fn from_intervals(mode: WindowMode, intervals: Vec<(NaiveTime, NaiveTime)>) -> Self {
        WindowGate {
            mode,
            table: Table::Intervals(intervals),
        }
    }

    /// Build from a fixed-granularity boolean table, e.g. 48 slots of
    /// 30 minutes covering the day.
    pub fn from_slots(mode: WindowMode, width_minutes: u32, flags: Vec<bool>) -> Self {
        WindowGate {
            mode,
            table: Table::Slots {
                width_minutes,
                flags,
            },
        }
    }

    /// Parse `"HH:MM-HH:MM"` interval strings from configuration.
    pub fn parse_intervals(mode: WindowMode, intervals: &[String]) -> Result<Self> {
        let mut parsed = Vec::with_capacity(intervals.len());
        for text in intervals {
            parsed.push(parse_interval(text)?);
        }
        Ok(Self::from_intervals(mode, parsed))
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    /// Whether a new entry may be placed at this time of day.
    pub fn admits(&self, time: NaiveTime) -> bool {
        let inside = match &self.table {
            Table::Intervals(list) => list
                .iter()
                .any(|&(start, end)| in_interval(time, start, end)),
            Table::Slots {
                width_minutes,
                flags,
            } => {
                let minutes = time.hour() * 60 + time.minute();
                let slot = (minutes / width_minutes) as usize;
                match flags.get(slot) {
                    Some(&flag) => flag,
                    // out-of-range slots are forbidden regardless of mode
                    None => return false,
                }
            }
        };
        match self.mode {
            WindowMode::Allow => inside,
            WindowMode::Deny => !inside,
        }
    }
}

/// Distance test for a resting order near its trigger, used to cancel the
/// order rather than let it fill just as the window closes.
pub fn near_boundary(current_price: f64, trigger_price: f64, tolerance: f64) -> bool {
    (current_price - trigger_price).abs() < tolerance
}

fn in_interval(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if end <= start {
        // wraps midnight; an end of 00:00 means end of day
        t >= start || t < end
    } else {
        t >= start && t < end
    }
}

fn parse_interval(text: &str) -> Result<(NaiveTime, NaiveTime)> {
    let (start_text, end_text) = text
        .split_once('-')
        .with_context(|| format!("window interval '{}' is not 'HH:MM-HH:MM'", text))?;
    let start = parse_time(start_text.trim())?;
    let end = parse_time(end_text.trim())?;
    if start == end {
        bail!("window interval '{}' has equal bounds", text);
    }
    Ok((start, end))
}

pub(crate) fn parse_time(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .with_context(|| format!("invalid time of day '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(text: &str) -> NaiveTime {
        parse_time(text).unwrap()
    }

    #[test]
    fn test_deny_list_half_open_bounds() {
        let gate =
            WindowGate::parse_intervals(WindowMode::Deny, &["10:00-10:30".to_string()]).unwrap();
        assert!(!gate.admits(t("10:00:00")));
        assert!(!gate.admits(t("10:29:59")));
        assert!(gate.admits(t("10:30:00")));
        assert!(gate.admits(t("09:59:59")));
    }

    #[test]
    fn test_allow_list_half_open_bounds() {
        let gate = WindowGate::parse_intervals(
            WindowMode::Allow,
            &["08:30-10:00".to_string(), "14:00-16:00".to_string()],
        )
        .unwrap();
        assert!(gate.admits(t("08:30")));
        assert!(gate.admits(t("09:59:59")));
        assert!(!gate.admits(t("10:00")));
        assert!(gate.admits(t("15:00")));
        assert!(!gate.admits(t("12:00")));
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        let gate = WindowGate::from_intervals(WindowMode::Allow, vec![]);
        assert!(!gate.admits(t("12:00")));
    }

    #[test]
    fn test_empty_deny_list_admits_everything() {
        let gate = WindowGate::from_intervals(WindowMode::Deny, vec![]);
        assert!(gate.admits(t("12:00")));
    }

    #[test]
    fn test_interval_wrapping_midnight() {
        let gate =
            WindowGate::parse_intervals(WindowMode::Allow, &["23:30-00:00".to_string()]).unwrap();
        assert!(gate.admits(t("23:30")));
        assert!(gate.admits(t("23:59:59")));
        assert!(!gate.admits(t("00:00")));
        assert!(!gate.admits(t("12:00")));
    }

    #[test]
    fn test_slot_table() {
        // admit only 00:30-01:00 out of 48 half-hour slots
        let mut flags = vec![false; 48];
        flags[1] = true;
        let gate = WindowGate::from_slots(WindowMode::Allow, 30, flags);
        assert!(gate.admits(t("00:30")));
        assert!(gate.admits(t("00:59")));
        assert!(!gate.admits(t("01:00")));
        assert!(!gate.admits(t("00:29")));
    }

    #[test]
    fn test_short_slot_table_out_of_range_is_forbidden() {
        // table only covers the first two hours; later slots are forbidden
        // even under deny semantics
        let gate = WindowGate::from_slots(WindowMode::Deny, 30, vec![false; 4]);
        assert!(gate.admits(t("01:30")));
        assert!(!gate.admits(t("02:00")));
        assert!(!gate.admits(t("23:00")));
    }

    #[test]
    fn test_near_boundary() {
        let tolerance = 4.0 * 0.25;
        assert!(near_boundary(102.0, 102.25, tolerance));
        assert!(near_boundary(103.2, 102.25, tolerance));
        assert!(!near_boundary(103.3, 102.25, tolerance));
    }

    #[test]
    fn test_malformed_interval_rejected() {
        assert!(WindowGate::parse_intervals(WindowMode::Allow, &["10:00".to_string()]).is_err());
        assert!(
            WindowGate::parse_intervals(WindowMode::Allow, &["10:00-10:00".to_string()]).is_err()
        );
        assert!(
            WindowGate::parse_intervals(WindowMode::Allow, &["25:00-26:00".to_string()]).is_err()
        );
    }
}
