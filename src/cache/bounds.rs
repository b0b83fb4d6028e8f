//! Bounds Module
//!
//! Pure policy checks run before every write: TTL window, per-value size
//! and the soft total budget. None of these talk to the store.

use serde::Serialize;
use tracing::warn;

use crate::error::{CacheError, Result};

// == Limits ==
/// Shortest TTL accepted, in seconds
pub const MIN_TTL: u64 = 1;

/// Longest TTL accepted, in seconds (24 hours)
pub const MAX_TTL: u64 = 86_400;

/// Largest serialized value accepted, in bytes
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Soft cap on the total store usage, in bytes
pub const MAX_TOTAL_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

/// Usage ratio at which writes start to warn
pub const BUDGET_WARN_RATIO: f64 = 0.8;

// == Budget Status ==
/// Outcome of the total budget check for a write that was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Below the warning band
    Ok,
    /// Between 80% and 100% of the budget; the write proceeds
    Warn,
}

/// Checks that a TTL falls within `[MIN_TTL, MAX_TTL]`.
pub fn check_ttl(ttl: u64) -> Result<()> {
    if (MIN_TTL..=MAX_TTL).contains(&ttl) {
        Ok(())
    } else {
        Err(CacheError::TtlOutOfRange {
            ttl,
            min: MIN_TTL,
            max: MAX_TTL,
        })
    }
}

/// Checks the serialized size of a value against `limit`.
pub fn check_size(serialized: &[u8], limit: usize) -> Result<()> {
    if serialized.len() > limit {
        return Err(CacheError::ValueTooLarge {
            size: serialized.len(),
            limit,
        });
    }
    Ok(())
}

/// Checks a write of `incoming` bytes against the total budget.
///
/// Advisory only: `current_usage` is a snapshot, so concurrent writers
/// can transiently overshoot the cap.
pub fn check_total_budget(current_usage: u64, incoming: u64, limit: u64) -> Result<BudgetStatus> {
    let projected = current_usage.saturating_add(incoming);
    if projected > limit {
        return Err(CacheError::BudgetExceeded { projected, limit });
    }

    if projected as f64 >= limit as f64 * BUDGET_WARN_RATIO {
        warn!(
            projected,
            limit, "Cache usage is above {}% of budget", (BUDGET_WARN_RATIO * 100.0) as u32
        );
        return Ok(BudgetStatus::Warn);
    }

    Ok(BudgetStatus::Ok)
}
