use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PublicHoliday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "King's Day")]
    pub name: String,
    #[schema(example = "2025-04-27", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "NL")]
    pub country_code: String,
}
