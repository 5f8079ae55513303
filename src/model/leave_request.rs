use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ledger::LeaveKind;
use crate::domain::lifecycle::{Deletion, LeaveRequest, LeaveStatus, Stamp, StatusName};
use crate::error::AppError;

/// Column list matching [`LeaveRequestRow`].
pub const LEAVE_COLUMNS: &str = "id, employee_id, start_date, end_date, days_taken, status, \
     special_type_id, reset, deleted_at, deleted_by, approved_by, approved_at, \
     rejected_by, rejected_at, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_taken: i32,
    pub status: String,
    pub special_type_id: Option<u64>,
    pub reset: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<u64>,
    pub approved_by: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<u64>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn stamp(by: Option<u64>, at: Option<DateTime<Utc>>, fallback: DateTime<Utc>) -> Stamp {
    Stamp {
        by,
        at: at.unwrap_or(fallback),
    }
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        let name: StatusName = row.status.parse().map_err(|_| {
            AppError::Internal(anyhow::anyhow!(
                "leave request {} has unknown status {:?}",
                row.id,
                row.status
            ))
        })?;

        let status = match name {
            StatusName::Pending => LeaveStatus::Pending,
            StatusName::Approved => {
                LeaveStatus::Approved(stamp(row.approved_by, row.approved_at, row.created_at))
            }
            StatusName::Rejected => {
                LeaveStatus::Rejected(stamp(row.rejected_by, row.rejected_at, row.created_at))
            }
        };

        let deletion = match row.deleted_at {
            Some(at) => Deletion::Deleted(Stamp {
                by: row.deleted_by,
                at,
            }),
            None => Deletion::Active,
        };

        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            start_date: row.start_date,
            end_date: row.end_date,
            days_taken: row.days_taken,
            kind: LeaveKind::from_special_type(row.special_type_id),
            status,
            deletion,
            reset: row.reset,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    /// leave application id
    pub id: u64,
    /// employee id for whom the leave is applied
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-02", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// working days charged
    #[schema(example = 2)]
    pub days_taken: i32,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = 3, nullable = true)]
    pub special_type_id: Option<u64>,
    pub reset: bool,
    pub deleted: bool,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<&LeaveRequest> for LeaveResponse {
    fn from(r: &LeaveRequest) -> Self {
        Self {
            id: r.id,
            employee_id: r.employee_id,
            start_date: r.start_date,
            end_date: r.end_date,
            days_taken: r.days_taken,
            status: r.status.name().to_string(),
            special_type_id: r.kind.special_type_id(),
            reset: r.reset,
            deleted: r.is_deleted(),
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> LeaveRequestRow {
        let created = DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap();
        LeaveRequestRow {
            id: 5,
            employee_id: 1,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 22).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 23).unwrap(),
            days_taken: 2,
            status: status.into(),
            special_type_id: None,
            reset: false,
            deleted_at: None,
            deleted_by: None,
            approved_by: Some(9),
            approved_at: Some(created),
            rejected_by: None,
            rejected_at: None,
            created_at: created,
        }
    }

    #[test]
    fn row_maps_to_tagged_status() {
        let req = LeaveRequest::try_from(row("approved")).unwrap();
        assert!(matches!(req.status, LeaveStatus::Approved(Stamp { by: Some(9), .. })));
        assert_eq!(req.deletion, Deletion::Active);
        assert_eq!(req.kind, LeaveKind::Regular);
    }

    #[test]
    fn deletion_is_independent_of_status() {
        let mut r = row("pending");
        r.deleted_at = Some(r.created_at);
        r.deleted_by = Some(3);
        r.special_type_id = Some(7);
        let req = LeaveRequest::try_from(r).unwrap();
        assert_eq!(req.status, LeaveStatus::Pending);
        assert!(req.is_deleted());
        assert_eq!(req.kind, LeaveKind::Special { type_id: 7 });

        let resp = LeaveResponse::from(&req);
        assert!(resp.deleted);
        assert_eq!(resp.status, "pending");
    }

    #[test]
    fn unknown_status_is_an_internal_error() {
        assert!(matches!(
            LeaveRequest::try_from(row("archived")),
            Err(AppError::Internal(_))
        ));
    }
}
