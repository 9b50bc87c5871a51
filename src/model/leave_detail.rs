use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Participation of one employee in one leave type's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveDetail {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = 1)]
    pub leave_type_id: u64,
}
