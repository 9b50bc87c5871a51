use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Manager,
    Employee,
    Hr,
    HrManager,
}

impl Role {
    /// HR staff provision leave types, participation rows and balances.
    pub fn is_hr(self) -> bool {
        match self {
            Role::Hr | Role::HrManager => true,
            Role::Manager | Role::Employee => false,
        }
    }

    /// Roles allowed to act on other employees' leave.
    pub fn can_review_leave(self) -> bool {
        match self {
            Role::Manager | Role::Hr | Role::HrManager => true,
            Role::Employee => false,
        }
    }
}

impl TryFrom<String> for Role {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_snake_case() {
        assert_eq!("hr_manager".parse::<Role>().unwrap(), Role::HrManager);
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(Role::HrManager.to_string(), "hr_manager");
        assert_eq!(Role::Hr.as_ref(), "hr");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_column_values() {
        assert_eq!(
            serde_json::to_string(&Role::HrManager).unwrap(),
            "\"hr_manager\""
        );
        let role: Role = serde_json::from_str("\"employee\"").unwrap();
        assert_eq!(role, Role::Employee);
    }

    #[test]
    fn test_permissions() {
        assert!(Role::Hr.is_hr());
        assert!(Role::HrManager.is_hr());
        assert!(!Role::Manager.is_hr());
        assert!(Role::Manager.can_review_leave());
        assert!(!Role::Employee.can_review_leave());
    }
}
