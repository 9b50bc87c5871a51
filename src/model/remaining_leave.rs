use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Balance row: total vs remaining days for one leave detail in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RemainingLeave {
    #[schema(example = 9)]
    pub id: u64,
    #[schema(example = 4)]
    pub leave_detail_id: u64,
    #[schema(example = 12.0)]
    pub total_leaves: f64,
    #[schema(example = 5.0)]
    pub remaining_leaves: f64,
    #[schema(example = 2024)]
    pub year: i32,
}

/// Balance joined with its leave type name, for per-employee listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = 12.0)]
    pub total_leaves: f64,
    #[schema(example = 5.0)]
    pub remaining_leaves: f64,
    #[schema(example = 2024)]
    pub year: i32,
}
