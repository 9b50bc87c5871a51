use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for ApplicationStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveApplication {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = 1)]
    pub leave_type_id: u64,
    #[schema(example = "2024-02-28T09:00:00Z", format = "date-time", value_type = String)]
    pub date_of_application: DateTime<Utc>,
    #[schema(example = "2024-03-04", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-03-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "M1")]
    pub manager_id: String,
    #[schema(example = 2.0)]
    pub total_days: f64,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    #[schema(example = "M1", nullable = true)]
    pub done_by: Option<String>,
    #[schema(example = "Family function")]
    pub reason: String,
    #[schema(nullable = true)]
    pub file_path: Option<String>,
    #[schema(example = 0, nullable = true)]
    pub number_of_files: Option<i32>,
    #[schema(nullable = true)]
    pub reason_if_rejected: Option<String>,
}

pub const APPLICATION_COLUMNS: &str = "id, employee_id, leave_type_id, date_of_application, \
     start_date, end_date, manager_id, total_days, status, done_by, reason, file_path, \
     number_of_files, reason_if_rejected";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_column_text() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
        ] {
            let text = status.as_ref().to_string();
            assert_eq!(ApplicationStatus::try_from(text).unwrap(), status);
        }
        assert!(ApplicationStatus::try_from("cancelled".to_string()).is_err());
    }
}
