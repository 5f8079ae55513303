use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "country_code": "NL",
        "annual_entitlement": 25,
        "available_balance": 18,
        "last_rollover_year": 2025,
        "manager_id": 4,
        "position": "Engineer"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    /// ISO 3166 alpha-2, selects the public holiday calendar
    #[schema(example = "NL")]
    pub country_code: String,

    /// Days credited on every rollover
    #[schema(example = 25)]
    pub annual_entitlement: i32,

    #[schema(example = 18)]
    pub available_balance: i32,

    #[schema(example = 2025)]
    pub last_rollover_year: i32,

    #[schema(example = 4, nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(example = "Engineer", nullable = true)]
    pub position: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
