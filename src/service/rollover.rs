use chrono::{Datelike, Utc};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};

use crate::domain::rollover::{self, RolloverOutcome};
use crate::error::AppResult;
use crate::repo::{employee_repo, leave_repo};

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Credits the yearly entitlement to every employee not yet rolled over in `year`.
///
/// Each employee is handled in its own transaction, so a failure part-way
/// leaves the employees already processed complete and the rest untouched.
/// Running it again in the same year does nothing.
#[instrument(skip(pool))]
pub async fn run(pool: &MySqlPool, year: i32) -> AppResult<Vec<RolloverOutcome>> {
    let due = employee_repo::due_for_rollover(pool, year).await?;
    let mut outcomes = Vec::with_capacity(due.len());

    for employee_id in due {
        if let Some(outcome) = roll_over_employee(pool, employee_id, year).await? {
            outcomes.push(outcome);
        }
    }

    if !outcomes.is_empty() {
        info!(year, employees = outcomes.len(), "Annual rollover applied");
    }
    Ok(outcomes)
}

async fn roll_over_employee(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
) -> AppResult<Option<RolloverOutcome>> {
    let mut tx = pool.begin().await?;

    // another sweep may have won the race since the id list was read
    let Some(mut employee) = employee_repo::find_for_update(&mut *tx, employee_id).await? else {
        return Ok(None);
    };
    let mut requests = leave_repo::resettable_for_update(&mut *tx, employee_id, year).await?;

    let Some(outcome) = rollover::roll_over(&mut employee, &mut requests, year) else {
        debug!(employee_id, year, "Already rolled over");
        return Ok(None);
    };

    employee_repo::save_balance(&mut *tx, &employee).await?;
    leave_repo::mark_reset(&mut *tx, &outcome.reset_ids).await?;
    tx.commit().await?;

    debug!(
        employee_id,
        credited = outcome.credited,
        reset = outcome.reset_ids.len(),
        balance = employee.available_balance,
        "Employee rolled over"
    );
    Ok(Some(outcome))
}
