use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::role::Role;

/// A row of the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub designation: String,
    pub status: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub email: String,
    /// argon2 PHC string
    #[serde(skip_serializing)]
    pub password: String,
    pub manager_id: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const EMPLOYEE_COLUMNS: &str = "employee_id, name, designation, status, role, email, password, \
     manager_id, is_active, created_at, updated_at";
