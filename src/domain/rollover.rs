//! Yearly entitlement credit and retirement of last year's approved requests.

use chrono::Datelike;

use crate::domain::lifecycle::{LeaveRequest, LeaveStatus};
use crate::model::employee::Employee;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverOutcome {
    pub employee_id: u64,
    pub credited: i32,
    pub year: i32,
    /// Requests that must be flagged `reset`
    pub reset_ids: Vec<u64>,
}

/// Applies the rollover for `current_year` to one employee.
///
/// Returns `None` when the employee was already rolled over this year, which
/// makes repeated calls within the same year a no-op.
pub fn roll_over(
    employee: &mut Employee,
    requests: &mut [LeaveRequest],
    current_year: i32,
) -> Option<RolloverOutcome> {
    if employee.last_rollover_year >= current_year {
        return None;
    }

    employee.available_balance += employee.annual_entitlement;
    employee.last_rollover_year = current_year;

    let mut reset_ids = Vec::new();
    for request in requests.iter_mut().filter(|r| {
        r.employee_id == employee.id
            && matches!(r.status, LeaveStatus::Approved(_))
            && !r.is_deleted()
            && !r.reset
            && r.start_date.year() < current_year
    }) {
        request.reset = true;
        reset_ids.push(request.id);
    }

    Some(RolloverOutcome {
        employee_id: employee.id,
        credited: employee.annual_entitlement,
        year: current_year,
        reset_ids,
    })
}

/// Days of non-reset, active requests touching `year`.
///
/// `special` selects special-leave requests instead of regular ones.
pub fn taken_days(requests: &[LeaveRequest], year: i32, special: bool) -> i32 {
    requests
        .iter()
        .filter(|r| r.is_active() && !r.reset && r.kind.is_special() == special)
        .filter(|r| r.start_date.year() == year || r.end_date.year() == year)
        .map(|r| r.days_taken)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::LeaveKind;
    use crate::domain::lifecycle::{Deletion, Stamp};
    use chrono::{DateTime, NaiveDate, Utc};

    fn at() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn employee(balance: i32, last_year: i32) -> Employee {
        Employee {
            id: 1,
            first_name: "Ann".into(),
            last_name: "Smith".into(),
            email: "ann@example.com".into(),
            country_code: "NL".into(),
            annual_entitlement: 25,
            available_balance: balance,
            last_rollover_year: last_year,
            manager_id: None,
            position: None,
        }
    }

    fn request(id: u64, year: i32, status: LeaveStatus, kind: LeaveKind) -> LeaveRequest {
        LeaveRequest {
            id,
            employee_id: 1,
            start_date: NaiveDate::from_ymd_opt(year, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, 3, 4).unwrap(),
            days_taken: 2,
            kind,
            status,
            deletion: Deletion::Active,
            reset: false,
            created_at: at(),
        }
    }

    fn approved() -> LeaveStatus {
        LeaveStatus::Approved(Stamp { by: Some(2), at: at() })
    }

    #[test]
    fn credits_entitlement_and_resets_prior_years() {
        let mut emp = employee(3, 2024);
        let mut requests = vec![
            request(1, 2024, approved(), LeaveKind::Regular),
            request(2, 2024, LeaveStatus::Pending, LeaveKind::Regular),
            request(3, 2025, approved(), LeaveKind::Regular),
        ];

        let outcome = roll_over(&mut emp, &mut requests, 2025).unwrap();

        assert_eq!(emp.available_balance, 28);
        assert_eq!(emp.last_rollover_year, 2025);
        assert_eq!(outcome.reset_ids, vec![1]);
        assert!(requests[0].reset);
        assert!(!requests[1].reset);
        assert!(!requests[2].reset);
    }

    #[test]
    fn second_rollover_in_same_year_is_a_no_op() {
        let mut emp = employee(0, 2024);
        let mut requests = vec![request(1, 2024, approved(), LeaveKind::Regular)];

        assert!(roll_over(&mut emp, &mut requests, 2025).is_some());
        assert!(roll_over(&mut emp, &mut requests, 2025).is_none());
        assert_eq!(emp.available_balance, 25);
    }

    #[test]
    fn deleted_requests_are_not_reset() {
        let mut emp = employee(0, 2024);
        let mut deleted = request(1, 2024, approved(), LeaveKind::Regular);
        deleted.deletion = Deletion::Deleted(Stamp { by: None, at: at() });
        let mut requests = vec![deleted];

        let outcome = roll_over(&mut emp, &mut requests, 2025).unwrap();
        assert!(outcome.reset_ids.is_empty());
    }

    #[test]
    fn taken_days_skip_reset_and_split_by_kind() {
        let mut old = request(1, 2025, approved(), LeaveKind::Regular);
        old.reset = true;
        let requests = vec![
            old,
            request(2, 2025, approved(), LeaveKind::Regular),
            request(3, 2025, LeaveStatus::Pending, LeaveKind::Regular),
            request(4, 2025, approved(), LeaveKind::Special { type_id: 7 }),
            request(
                5,
                2025,
                LeaveStatus::Rejected(Stamp { by: None, at: at() }),
                LeaveKind::Regular,
            ),
        ];

        assert_eq!(taken_days(&requests, 2025, false), 4);
        assert_eq!(taken_days(&requests, 2025, true), 2);
        assert_eq!(taken_days(&requests, 2024, false), 0);
    }
}
