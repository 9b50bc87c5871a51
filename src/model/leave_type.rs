use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveType {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = "Casual leave for personal matters")]
    pub leave_description: String,
}
