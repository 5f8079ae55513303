//! Transactional shell around the request lifecycle.
//!
//! Every operation locks the employee row first, then the request and the
//! special-leave usage row, runs the domain transition and persists its result
//! in the same transaction. Notifications are handed back to the caller so
//! they can be dispatched after commit.

use chrono::Utc;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, instrument};

use crate::domain::authz::Actor;
use crate::domain::ledger::{self, LeaveKind};
use crate::domain::lifecycle::{self, LeaveDraft, LeaveRequest, SpecialAccount};
use crate::domain::notification::Notification;
use crate::error::{AppError, AppResult};
use crate::holidays;
use crate::model::employee::Employee;
use crate::model::special_leave::{SpecialLeaveType, SpecialLeaveUsage};
use crate::repo::{employee_repo, leave_repo, special_leave_repo};

type SpecialCounter = (SpecialLeaveType, SpecialLeaveUsage);

fn special_account(counter: &mut Option<SpecialCounter>) -> Option<SpecialAccount<'_>> {
    counter.as_mut().map(|(leave_type, usage)| SpecialAccount {
        leave_type: &*leave_type,
        usage,
    })
}

async fn lock_employee(tx: &mut Transaction<'_, MySql>, employee_id: u64) -> AppResult<Employee> {
    employee_repo::find_for_update(&mut **tx, employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))
}

/// Loads and locks the usage counter a request of `kind` draws from.
async fn lock_special(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    kind: LeaveKind,
    start: chrono::NaiveDate,
) -> AppResult<Option<SpecialCounter>> {
    let LeaveKind::Special { type_id } = kind else {
        return Ok(None);
    };

    let leave_type = special_leave_repo::find_type(&mut **tx, type_id)
        .await?
        .ok_or(AppError::NotFound("Special leave type"))?;

    let year = ledger::usage_year(start);
    special_leave_repo::ensure_usage(&mut **tx, employee_id, type_id, year).await?;
    let usage = special_leave_repo::usage_for_update(&mut **tx, employee_id, type_id, year)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "usage row for employee {employee_id}, type {type_id}, year {year} vanished"
            ))
        })?;

    Ok(Some((leave_type, usage)))
}

async fn persist_counters(
    tx: &mut Transaction<'_, MySql>,
    employee: &Employee,
    special: &Option<SpecialCounter>,
) -> AppResult<()> {
    match special {
        Some((_, usage)) => special_leave_repo::save_usage(&mut **tx, usage).await?,
        None => employee_repo::save_balance(&mut **tx, employee).await?,
    }
    Ok(())
}

/// Locks the employee owning `request_id`, then the request itself.
async fn lock_request(
    tx: &mut Transaction<'_, MySql>,
    request_id: u64,
) -> AppResult<(Employee, LeaveRequest)> {
    let owner = leave_repo::find(&mut **tx, request_id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?
        .employee_id;

    let employee = lock_employee(tx, owner).await?;
    let request = leave_repo::find_for_update(&mut **tx, request_id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;
    Ok((employee, request))
}

/// Creates a pending request for the actor's own employee profile.
#[instrument(skip(pool, actor), fields(user_id = actor.user_id))]
pub async fn submit(
    pool: &MySqlPool,
    actor: &Actor,
    draft: LeaveDraft,
) -> AppResult<(LeaveRequest, Vec<Notification>)> {
    let employee_id = actor.employee_id()?;
    ledger::check_span(draft.start_date, draft.end_date)?;

    // loaded before the transaction: a cache miss needs its own connection
    let country_code = employee_repo::find(pool, employee_id)
        .await?
        .ok_or(AppError::NotFound("Employee"))?
        .country_code;
    let holidays =
        holidays::holidays_between(pool, &country_code, draft.start_date, draft.end_date).await?;

    let mut tx = pool.begin().await?;
    let mut employee = lock_employee(&mut tx, employee_id).await?;
    if employee.country_code != country_code {
        return Err(AppError::validation(
            "Your country changed while the request was submitted. Please try again.",
        ));
    }
    let existing =
        leave_repo::active_overlapping(&mut *tx, employee_id, draft.start_date, draft.end_date)
            .await?;
    let mut special = lock_special(&mut tx, employee_id, draft.kind, draft.start_date).await?;

    let submission = lifecycle::submit(
        &mut employee,
        &draft,
        special_account(&mut special),
        &holidays,
        &existing,
    )?;

    let id = leave_repo::insert(&mut *tx, &submission.request).await?;
    persist_counters(&mut tx, &employee, &special).await?;
    let request = leave_repo::find(&mut *tx, id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;
    tx.commit().await?;

    info!(
        request_id = id,
        employee_id,
        days = request.days_taken,
        special = request.kind.is_special(),
        "Leave request submitted"
    );
    Ok((request, vec![submission.notification]))
}

#[instrument(skip(pool, actor), fields(user_id = actor.user_id))]
pub async fn approve(
    pool: &MySqlPool,
    actor: &Actor,
    request_id: u64,
) -> AppResult<(LeaveRequest, Vec<Notification>)> {
    let mut tx = pool.begin().await?;
    let (employee, mut request) = lock_request(&mut tx, request_id).await?;

    let note = request.approve(actor, &employee, Utc::now())?;
    leave_repo::save_state(&mut *tx, &request).await?;
    tx.commit().await?;

    info!(request_id, employee_id = employee.id, "Leave request approved");
    Ok((request, vec![note]))
}

#[instrument(skip(pool, actor), fields(user_id = actor.user_id))]
pub async fn reject(
    pool: &MySqlPool,
    actor: &Actor,
    request_id: u64,
) -> AppResult<(LeaveRequest, Vec<Notification>)> {
    let mut tx = pool.begin().await?;
    let (mut employee, mut request) = lock_request(&mut tx, request_id).await?;
    let mut special = lock_special(&mut tx, employee.id, request.kind, request.start_date).await?;

    let note = request.reject(actor, &mut employee, special_account(&mut special), Utc::now())?;
    leave_repo::save_state(&mut *tx, &request).await?;
    persist_counters(&mut tx, &employee, &special).await?;
    tx.commit().await?;

    info!(
        request_id,
        employee_id = employee.id,
        released = request.days_taken,
        "Leave request rejected"
    );
    Ok((request, vec![note]))
}

/// Soft-deletes a request. Nobody is notified.
#[instrument(skip(pool, actor), fields(user_id = actor.user_id))]
pub async fn delete(pool: &MySqlPool, actor: &Actor, request_id: u64) -> AppResult<LeaveRequest> {
    let mut tx = pool.begin().await?;
    let (mut employee, mut request) = lock_request(&mut tx, request_id).await?;
    let mut special = lock_special(&mut tx, employee.id, request.kind, request.start_date).await?;

    request.soft_delete(actor, &mut employee, special_account(&mut special), Utc::now())?;
    leave_repo::save_state(&mut *tx, &request).await?;
    persist_counters(&mut tx, &employee, &special).await?;
    tx.commit().await?;

    info!(request_id, employee_id = employee.id, "Leave request deleted");
    Ok(request)
}
