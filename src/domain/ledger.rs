//! Working-day arithmetic and the balance/quota book-keeping behind leave requests.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{AppError, AppResult};
use crate::model::special_leave::{SpecialLeaveType, SpecialLeaveUsage};

/// Longest request, in calendar days, start and end included.
pub const MAX_SPAN_DAYS: i64 = 366;

/// Rejects inverted ranges and ranges longer than [`MAX_SPAN_DAYS`].
///
/// A valid range touches at most two calendar years.
pub fn check_span(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::validation("End date must be after start date."));
    }
    if (end - start).num_days() + 1 > MAX_SPAN_DAYS {
        return Err(AppError::validation(format!(
            "A leave request may span at most {MAX_SPAN_DAYS} days."
        )));
    }
    Ok(())
}

/// Counts the dates in `start..=end` that are neither Saturday/Sunday nor in `holidays`.
pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HashSet<NaiveDate>,
) -> AppResult<i32> {
    check_span(start, end)?;

    let count = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|day| !holidays.contains(day))
        .count();

    Ok(count as i32)
}

/// Where the days of a request are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveKind {
    Regular,
    Special { type_id: u64 },
}

impl LeaveKind {
    pub fn from_special_type(special_type_id: Option<u64>) -> Self {
        match special_type_id {
            Some(type_id) => LeaveKind::Special { type_id },
            None => LeaveKind::Regular,
        }
    }

    pub fn special_type_id(&self) -> Option<u64> {
        match self {
            LeaveKind::Regular => None,
            LeaveKind::Special { type_id } => Some(*type_id),
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, LeaveKind::Special { .. })
    }
}

/// Mutable view over the counters a request draws from, loaded (and row-locked)
/// by the caller before any lifecycle operation.
#[derive(Debug)]
pub enum Account<'a> {
    Balance(&'a mut i32),
    Special {
        leave_type: &'a SpecialLeaveType,
        usage: &'a mut SpecialLeaveUsage,
    },
}

impl Account<'_> {
    /// Takes `days` out of the account, or fails without touching it.
    pub fn reserve(&mut self, days: i32) -> AppResult<()> {
        match self {
            Account::Balance(available) => {
                if **available < days {
                    return Err(AppError::InsufficientBalance {
                        requested: days,
                        available: **available,
                    });
                }
                **available -= days;
            }
            Account::Special { leave_type, usage } => {
                if usage.days_used + days > leave_type.max_days {
                    return Err(AppError::QuotaExceeded {
                        leave_type: leave_type.name.clone(),
                        requested: days,
                        used: usage.days_used,
                        max: leave_type.max_days,
                    });
                }
                usage.days_used += days;
            }
        }
        Ok(())
    }

    /// Gives `days` back. Special usage never drops below zero.
    pub fn release(&mut self, days: i32) {
        match self {
            Account::Balance(available) => **available += days,
            Account::Special { usage, .. } => {
                usage.days_used = (usage.days_used - days).max(0);
            }
        }
    }
}

/// Calendar year a special-leave request is booked against.
pub fn usage_year(start: NaiveDate) -> i32 {
    start.year()
}

/// True when `[start, end]` shares at least one day with `[other_start, other_end]`.
pub fn overlaps(
    start: NaiveDate,
    end: NaiveDate,
    other_start: NaiveDate,
    other_end: NaiveDate,
) -> bool {
    other_start <= end && other_end >= start
}
