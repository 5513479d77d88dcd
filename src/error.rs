//! Strategy error taxonomy

use thiserror::Error;

/// Errors surfaced by the strategy core.
///
/// Venue-call failures are recovered locally by resetting the affected
/// order handle; none of them abort the controller loop. Only
/// configuration errors (handled in `config`) are fatal at startup.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Computed stop distance was not positive. Arming is skipped for
    /// this bar, no retry.
    #[error("invalid risk: stop distance {0} is not positive")]
    InvalidRisk(f64),

    /// An entry order is already resident. Re-entrancy guard.
    #[error("entry already armed")]
    AlreadyArmed,

    /// Venue declined an order. Terminal; eligible to re-arm on the next
    /// qualifying bar.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Rotation token store unreachable. The instance stays Waiting and
    /// retries on the next tick.
    #[error("rotation store i/o: {0}")]
    RotationIo(#[from] std::io::Error),

    /// RiskContext read while the position is flat. Programming-invariant
    /// violation, not a recoverable condition.
    #[error("risk context read while position is flat")]
    StaleRiskRead,
}
