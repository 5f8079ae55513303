use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SpecialLeaveType {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Marriage Leave")]
    pub name: String,
    /// Yearly cap per employee
    #[schema(example = 5)]
    pub max_days: i32,
}

/// Days used of one special leave type by one employee in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SpecialLeaveUsage {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub year: i32,
    pub days_used: i32,
}

impl SpecialLeaveUsage {
    pub fn empty(employee_id: u64, leave_type_id: u64, year: i32) -> Self {
        Self {
            employee_id,
            leave_type_id,
            year,
            days_used: 0,
        }
    }
}
