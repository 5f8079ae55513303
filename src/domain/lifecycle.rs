//! State machine of a leave request.
//!
//! A request is `Pending`, `Approved` or `Rejected`, and independently either
//! `Active` or soft-`Deleted`. The methods on [`LeaveRequest`] and [`submit`]
//! are the only way to move between states; each one reconciles the
//! employee's balance or special-leave usage through a ledger [`Account`].

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::domain::authz::{Actor, Capability};
use crate::domain::ledger::{self, Account, LeaveKind};
use crate::domain::notification::Notification;
use crate::error::{AppError, AppResult};
use crate::model::employee::Employee;
use crate::model::special_leave::{SpecialLeaveType, SpecialLeaveUsage};

/// Who changed a request and when. `by` is empty once the acting user is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub by: Option<u64>,
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn new(actor: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            by: Some(actor.user_id),
            at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveStatus {
    Pending,
    Approved(Stamp),
    Rejected(Stamp),
}

/// Column value of [`LeaveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum StatusName {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn name(&self) -> StatusName {
        match self {
            LeaveStatus::Pending => StatusName::Pending,
            LeaveStatus::Approved(_) => StatusName::Approved,
            LeaveStatus::Rejected(_) => StatusName::Rejected,
        }
    }

    /// Pending and approved requests still hold the days taken at submission.
    pub fn holds_reservation(&self) -> bool {
        !matches!(self, LeaveStatus::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Active,
    Deleted(Stamp),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_taken: i32,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
    pub deletion: Deletion,
    /// Set by the rollover on approved requests of earlier years.
    pub reset: bool,
    pub created_at: DateTime<Utc>,
}

/// Counter a request draws from, as loaded by the caller.
pub struct SpecialAccount<'a> {
    pub leave_type: &'a SpecialLeaveType,
    pub usage: &'a mut SpecialLeaveUsage,
}

fn account<'a>(
    kind: LeaveKind,
    employee: &'a mut Employee,
    special: Option<SpecialAccount<'a>>,
) -> AppResult<Account<'a>> {
    match (kind, special) {
        (LeaveKind::Regular, _) => Ok(Account::Balance(&mut employee.available_balance)),
        (LeaveKind::Special { type_id }, Some(SpecialAccount { leave_type, usage }))
            if leave_type.id == type_id && usage.leave_type_id == type_id =>
        {
            Ok(Account::Special { leave_type, usage })
        }
        (LeaveKind::Special { .. }, _) => Err(AppError::Internal(anyhow::anyhow!(
            "special leave account missing or mismatched"
        ))),
    }
}

impl LeaveRequest {
    pub fn is_deleted(&self) -> bool {
        matches!(self.deletion, Deletion::Deleted(_))
    }

    /// Counts against overlap checks and totals: not deleted, pending or approved.
    pub fn is_active(&self) -> bool {
        !self.is_deleted() && self.status.holds_reservation()
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        ledger::overlaps(start, end, self.start_date, self.end_date)
    }

    fn ensure_not_deleted(&self) -> AppResult<()> {
        if self.is_deleted() {
            return Err(AppError::validation("Leave request has been deleted"));
        }
        Ok(())
    }

    /// Pending → Approved. Days were reserved at submission, so no balance change.
    pub fn approve(
        &mut self,
        actor: &Actor,
        employee: &Employee,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        actor.require_review_of(employee, Capability::ApproveLeave)?;
        self.ensure_not_deleted()?;
        if self.status != LeaveStatus::Pending {
            return Err(AppError::validation(
                "Leave request not found or already processed",
            ));
        }

        self.status = LeaveStatus::Approved(Stamp::new(actor, now));
        Ok(Notification::RequestDecided {
            request_id: self.id,
            employee_id: self.employee_id,
            approved: true,
        })
    }

    /// Pending or Approved → Rejected, giving the reserved days back.
    pub fn reject<'a>(
        &mut self,
        actor: &Actor,
        employee: &'a mut Employee,
        special: Option<SpecialAccount<'a>>,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        actor.require_review_of(employee, Capability::RejectLeave)?;
        self.ensure_not_deleted()?;
        if matches!(self.status, LeaveStatus::Rejected(_)) {
            return Err(AppError::validation("Leave request is already rejected"));
        }

        account(self.kind, employee, special)?.release(self.days_taken);
        self.status = LeaveStatus::Rejected(Stamp::new(actor, now));
        Ok(Notification::RequestDecided {
            request_id: self.id,
            employee_id: self.employee_id,
            approved: false,
        })
    }

    /// Marks the request deleted whatever its status. Days still reserved by a
    /// pending or approved request are given back; a rejected one already did.
    pub fn soft_delete<'a>(
        &mut self,
        actor: &Actor,
        employee: &'a mut Employee,
        special: Option<SpecialAccount<'a>>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if !actor.capabilities.has(Capability::DeleteLeave) {
            let message = if actor.capabilities.has(Capability::ViewHoliday) {
                "You can view this page but don't have permission to delete."
            } else {
                "You don't have permission to perform this action."
            };
            return Err(AppError::forbidden(message));
        }
        self.ensure_not_deleted()?;

        if self.status.holds_reservation() {
            account(self.kind, employee, special)?.release(self.days_taken);
        }
        self.deletion = Deletion::Deleted(Stamp::new(actor, now));
        Ok(())
    }
}

/// What an employee asks for.
#[derive(Debug, Clone, Copy)]
pub struct LeaveDraft {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: LeaveKind,
}

/// A validated request ready to be inserted as pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeaveRequest {
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_taken: i32,
    pub kind: LeaveKind,
}

#[derive(Debug)]
pub struct Submission {
    pub request: NewLeaveRequest,
    pub notification: Notification,
}

/// Validates a draft and reserves its days.
///
/// `existing` are the employee's requests that may overlap the draft; deleted
/// and rejected ones are ignored. On error nothing is mutated.
pub fn submit<'a>(
    employee: &'a mut Employee,
    draft: &LeaveDraft,
    special: Option<SpecialAccount<'a>>,
    holidays: &HashSet<NaiveDate>,
    existing: &[LeaveRequest],
) -> AppResult<Submission> {
    let days = ledger::working_days(draft.start_date, draft.end_date, holidays)?;
    if days == 0 {
        return Err(AppError::validation(
            "You have not selected any valid days to take off. Please select weekdays that are not holidays.",
        ));
    }

    if existing
        .iter()
        .any(|r| r.employee_id == employee.id && r.is_active() && r.overlaps(draft.start_date, draft.end_date))
    {
        return Err(AppError::validation(
            "You already have a holiday request that overlaps with this date range.",
        ));
    }

    let employee_id = employee.id;
    let notification = Notification::RequestCreated {
        employee_id,
        employee_name: employee.full_name(),
        manager_id: employee.manager_id,
        start_date: draft.start_date,
        end_date: draft.end_date,
        days,
    };

    account(draft.kind, employee, special)?.reserve(days)?;

    Ok(Submission {
        request: NewLeaveRequest {
            employee_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            days_taken: days,
            kind: draft.kind,
        },
        notification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::authz::Capabilities;
    use crate::model::role::Role;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_753_000_000, 0).unwrap()
    }

    fn employee(balance: i32) -> Employee {
        Employee {
            id: 1,
            first_name: "Ann".into(),
            last_name: "Smith".into(),
            email: "ann@example.com".into(),
            country_code: "NL".into(),
            annual_entitlement: 25,
            available_balance: balance,
            last_rollover_year: 2025,
            manager_id: Some(4),
            position: None,
        }
    }

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: 40,
            employee_id: Some(4),
            capabilities: role.capabilities(),
        }
    }

    fn marriage() -> SpecialLeaveType {
        SpecialLeaveType {
            id: 7,
            name: "Marriage Leave".into(),
            max_days: 5,
        }
    }

    fn regular(start: NaiveDate, end: NaiveDate) -> LeaveDraft {
        LeaveDraft {
            start_date: start,
            end_date: end,
            kind: LeaveKind::Regular,
        }
    }

    fn stored(new: NewLeaveRequest, id: u64) -> LeaveRequest {
        LeaveRequest {
            id,
            employee_id: new.employee_id,
            start_date: new.start_date,
            end_date: new.end_date,
            days_taken: new.days_taken,
            kind: new.kind,
            status: LeaveStatus::Pending,
            deletion: Deletion::Active,
            reset: false,
            created_at: now(),
        }
    }

    #[test]
    fn submit_excludes_weekend_and_holiday() {
        let mut emp = employee(10);
        let holidays = HashSet::from([d(2025, 7, 21)]);
        let sub = submit(&mut emp, &regular(d(2025, 7, 20), d(2025, 7, 23)), None, &holidays, &[])
            .unwrap();

        assert_eq!(sub.request.days_taken, 2);
        assert_eq!(emp.available_balance, 8);
        assert!(matches!(
            sub.notification,
            Notification::RequestCreated {
                manager_id: Some(4),
                days: 2,
                ..
            }
        ));
    }

    #[test]
    fn submit_refuses_ranges_longer_than_a_year() {
        let mut emp = employee(500);
        let err = submit(
            &mut emp,
            &regular(d(2025, 1, 1), d(9999, 12, 31)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap_err();

        assert!(err.to_string().contains("at most 366 days"));
        assert_eq!(emp.available_balance, 500);
    }

    #[test]
    fn submit_with_insufficient_balance_leaves_balance() {
        let mut emp = employee(1);
        let err = submit(
            &mut emp,
            &regular(d(2025, 7, 22), d(2025, 7, 24)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap_err();

        assert!(err.to_string().contains("enough available holidays"));
        assert_eq!(emp.available_balance, 1);
    }

    #[test]
    fn special_submission_uses_quota_not_balance() {
        let mut emp = employee(5);
        let leave_type = marriage();
        let mut usage = SpecialLeaveUsage::empty(1, 7, 2025);
        let draft = LeaveDraft {
            start_date: d(2025, 7, 22),
            end_date: d(2025, 7, 23),
            kind: LeaveKind::Special { type_id: 7 },
        };

        let sub = submit(
            &mut emp,
            &draft,
            Some(SpecialAccount {
                leave_type: &leave_type,
                usage: &mut usage,
            }),
            &HashSet::new(),
            &[],
        )
        .unwrap();

        assert_eq!(sub.request.days_taken, 2);
        assert_eq!(usage.days_used, 2);
        assert_eq!(emp.available_balance, 5);
    }

    #[test]
    fn special_submission_over_quota_leaves_usage() {
        let mut emp = employee(5);
        let leave_type = marriage();
        let mut usage = SpecialLeaveUsage {
            days_used: 4,
            ..SpecialLeaveUsage::empty(1, 7, 2025)
        };
        let draft = LeaveDraft {
            start_date: d(2025, 7, 22),
            end_date: d(2025, 7, 23),
            kind: LeaveKind::Special { type_id: 7 },
        };

        let err = submit(
            &mut emp,
            &draft,
            Some(SpecialAccount {
                leave_type: &leave_type,
                usage: &mut usage,
            }),
            &HashSet::new(),
            &[],
        )
        .unwrap_err();

        assert!(matches!(err, AppError::QuotaExceeded { .. }));
        assert_eq!(usage.days_used, 4);
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let mut emp = employee(5);
        let err = submit(
            &mut emp,
            &regular(d(2025, 7, 25), d(2025, 7, 22)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("after start date"));
        assert_eq!(emp.available_balance, 5);
    }

    #[test]
    fn weekend_only_range_is_rejected() {
        let mut emp = employee(5);
        let err = submit(
            &mut emp,
            &regular(d(2025, 7, 19), d(2025, 7, 20)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("any valid days"));
    }

    #[test]
    fn overlap_with_active_request_is_rejected() {
        let mut emp = employee(20);
        let first = submit(
            &mut emp,
            &regular(d(2025, 7, 21), d(2025, 7, 25)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap();
        let existing = vec![stored(first.request, 1)];

        let err = submit(
            &mut emp,
            &regular(d(2025, 7, 25), d(2025, 7, 29)),
            None,
            &HashSet::new(),
            &existing,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlaps"));
        assert_eq!(emp.available_balance, 15);
    }

    #[test]
    fn rejected_and_deleted_requests_do_not_block() {
        let mut emp = employee(20);
        let mut rejected = stored(
            NewLeaveRequest {
                employee_id: 1,
                start_date: d(2025, 7, 21),
                end_date: d(2025, 7, 22),
                days_taken: 2,
                kind: LeaveKind::Regular,
            },
            1,
        );
        rejected.status = LeaveStatus::Rejected(Stamp { by: None, at: now() });
        let mut deleted = rejected.clone();
        deleted.id = 2;
        deleted.status = LeaveStatus::Pending;
        deleted.deletion = Deletion::Deleted(Stamp { by: None, at: now() });

        assert!(submit(
            &mut emp,
            &regular(d(2025, 7, 21), d(2025, 7, 22)),
            None,
            &HashSet::new(),
            &[rejected, deleted],
        )
        .is_ok());
    }

    #[test]
    fn approve_keeps_balance_and_notifies_employee() {
        let mut emp = employee(10);
        let sub = submit(
            &mut emp,
            &regular(d(2025, 7, 22), d(2025, 7, 24)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap();
        let mut req = stored(sub.request, 11);

        let note = req.approve(&actor(Role::Manager), &emp, now()).unwrap();
        assert_eq!(emp.available_balance, 7);
        assert!(matches!(req.status, LeaveStatus::Approved(Stamp { by: Some(40), .. })));
        assert_eq!(
            note,
            Notification::RequestDecided {
                request_id: 11,
                employee_id: 1,
                approved: true
            }
        );

        // approving twice is not a valid transition
        assert!(req.approve(&actor(Role::Manager), &emp, now()).is_err());
    }

    #[test]
    fn approve_requires_review_authority() {
        let emp = employee(10);
        let mut req = stored(
            NewLeaveRequest {
                employee_id: 1,
                start_date: d(2025, 7, 22),
                end_date: d(2025, 7, 22),
                days_taken: 1,
                kind: LeaveKind::Regular,
            },
            1,
        );

        let outsider = Actor {
            user_id: 50,
            employee_id: Some(9),
            capabilities: Role::Manager.capabilities(),
        };
        assert!(matches!(
            req.approve(&outsider, &emp, now()),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            req.approve(&actor(Role::Employee), &emp, now()),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(req.status, LeaveStatus::Pending);
    }

    #[test]
    fn rejecting_approved_request_credits_original_days() {
        let mut emp = employee(10);
        let sub = submit(
            &mut emp,
            &regular(d(2025, 7, 22), d(2025, 7, 24)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap();
        let mut req = stored(sub.request, 1);
        req.approve(&actor(Role::Hr), &emp, now()).unwrap();
        assert_eq!(emp.available_balance, 7);

        req.reject(&actor(Role::Hr), &mut emp, None, now()).unwrap();
        assert_eq!(emp.available_balance, 10);
        assert_eq!(req.status.name(), StatusName::Rejected);

        assert!(req.reject(&actor(Role::Hr), &mut emp, None, now()).is_err());
        assert_eq!(emp.available_balance, 10);
    }

    #[test]
    fn rejecting_special_request_floors_usage_at_zero() {
        let mut emp = employee(10);
        let leave_type = marriage();
        let mut usage = SpecialLeaveUsage {
            days_used: 1,
            ..SpecialLeaveUsage::empty(1, 7, 2025)
        };
        let mut req = stored(
            NewLeaveRequest {
                employee_id: 1,
                start_date: d(2025, 7, 22),
                end_date: d(2025, 7, 24),
                days_taken: 3,
                kind: LeaveKind::Special { type_id: 7 },
            },
            1,
        );

        req.reject(
            &actor(Role::Hr),
            &mut emp,
            Some(SpecialAccount {
                leave_type: &leave_type,
                usage: &mut usage,
            }),
            now(),
        )
        .unwrap();

        assert_eq!(usage.days_used, 0);
        assert_eq!(emp.available_balance, 10);
    }

    #[test]
    fn delete_releases_once_and_only_for_reserving_states() {
        let mut emp = employee(10);
        let sub = submit(
            &mut emp,
            &regular(d(2025, 7, 22), d(2025, 7, 24)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap();
        let mut req = stored(sub.request, 1);
        let admin = actor(Role::Admin);

        req.soft_delete(&admin, &mut emp, None, now()).unwrap();
        assert_eq!(emp.available_balance, 10);
        assert!(req.is_deleted());
        assert!(!req.is_active());

        assert!(req.soft_delete(&admin, &mut emp, None, now()).is_err());
        assert_eq!(emp.available_balance, 10);
    }

    #[test]
    fn deleting_rejected_request_does_not_credit_twice() {
        let mut emp = employee(10);
        let sub = submit(
            &mut emp,
            &regular(d(2025, 7, 22), d(2025, 7, 24)),
            None,
            &HashSet::new(),
            &[],
        )
        .unwrap();
        let mut req = stored(sub.request, 1);
        let admin = actor(Role::Admin);

        req.reject(&admin, &mut emp, None, now()).unwrap();
        req.soft_delete(&admin, &mut emp, None, now()).unwrap();
        assert_eq!(emp.available_balance, 10);
    }

    #[test]
    fn delete_requires_delete_capability() {
        let mut emp = employee(10);
        let mut req = stored(
            NewLeaveRequest {
                employee_id: 1,
                start_date: d(2025, 7, 22),
                end_date: d(2025, 7, 22),
                days_taken: 1,
                kind: LeaveKind::Regular,
            },
            1,
        );
        let err = req
            .soft_delete(&actor(Role::Manager), &mut emp, None, now())
            .unwrap_err();
        assert!(err.to_string().contains("view this page"));
        assert!(!req.is_deleted());

        let nobody = Actor {
            user_id: 1,
            employee_id: None,
            capabilities: Capabilities::default(),
        };
        let err = req.soft_delete(&nobody, &mut emp, None, now()).unwrap_err();
        assert!(err.to_string().contains("perform this action"));
    }

    #[test]
    fn balance_never_negative_nor_above_credits_over_a_sequence() {
        let mut emp = employee(5);
        let hr = actor(Role::Hr);
        let admin = actor(Role::Admin);
        let mut stored_requests: Vec<LeaveRequest> = Vec::new();

        let ranges = [
            (d(2025, 7, 21), d(2025, 7, 23)),
            (d(2025, 7, 24), d(2025, 7, 25)),
            (d(2025, 7, 28), d(2025, 7, 29)),
        ];
        for (i, (start, end)) in ranges.into_iter().enumerate() {
            if let Ok(sub) = submit(&mut emp, &regular(start, end), None, &HashSet::new(), &stored_requests) {
                stored_requests.push(stored(sub.request, i as u64 + 1));
            }
            assert!(emp.available_balance >= 0);
        }
        // third range did not fit: 3 + 2 used, 0 left
        assert_eq!(stored_requests.len(), 2);
        assert_eq!(emp.available_balance, 0);

        stored_requests[0].approve(&hr, &emp, now()).unwrap();
        stored_requests[0].reject(&hr, &mut emp, None, now()).unwrap();
        stored_requests[1].soft_delete(&admin, &mut emp, None, now()).unwrap();
        stored_requests[0].soft_delete(&admin, &mut emp, None, now()).unwrap();

        assert_eq!(emp.available_balance, 5);
    }

    #[test]
    fn status_names_match_column_values() {
        assert_eq!(StatusName::Pending.as_ref(), "pending");
        assert_eq!("approved".parse::<StatusName>().unwrap(), StatusName::Approved);
        assert!("deleted".parse::<StatusName>().is_err());
    }
}
