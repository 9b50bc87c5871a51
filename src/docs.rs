use crate::api::{
    leave_applications::{ApprovalResponse, LeaveApplicationUpload, RejectLeave},
    leave_details::CreateLeaveDetail,
    leave_operations::{ApplyLeaveRequest, ApplyLeaveResponse},
    leave_types::CreateLeaveType,
    profile::ProfileUpdate,
    remaining_leaves::UpsertRemainingLeave,
    users::{CreateUser, EmployeeResponse},
};
use crate::leave::report::{LeaveSummaryPage, LeaveSummaryRow};
use crate::model::{
    leave_application::{ApplicationStatus, LeaveApplication},
    leave_detail::LeaveDetail,
    leave_type::LeaveType,
    profile::Profile,
    remaining_leave::{LeaveBalance, RemainingLeave},
    role::Role,
};
use crate::models::{LoginReqDto, RefreshTokenRequest, TokenResponse, UserInfo};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave HRM API",
        version = "1.0.0",
        description = r#"
## Leave management

Backend for employee leave: balances per leave type and year, leave
applications with manager/HR review, and a monthly report for reviewers.

### Key Features
- **Balances**: HR provisions yearly totals; applying or approving leave debits them atomically
- **Applications**: employees file requests (with an optional attachment); managers and HR approve or reject
- **Reports**: approved leave per employee per month, with search and pagination

### Security
All endpoints except login, refresh, logout and registration require a
**JWT Bearer** access token. Role checks: `employee`, `manager`, `hr`, `hr_manager`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::users::create_user,
        crate::api::users::me,

        crate::api::leave_types::create_leave_type,
        crate::api::leave_types::list_leave_types,
        crate::api::leave_details::create_leave_detail,

        crate::api::remaining_leaves::upsert_remaining_leave,
        crate::api::remaining_leaves::list_balances,
        crate::api::leave_operations::apply_leave,

        crate::api::leave_applications::create_application,
        crate::api::leave_applications::list_my_applications,
        crate::api::leave_applications::approve_application,
        crate::api::leave_applications::reject_application,

        crate::api::combined::all_leave_details,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile
    ),
    components(
        schemas(
            LoginReqDto,
            RefreshTokenRequest,
            TokenResponse,
            UserInfo,
            Role,
            CreateUser,
            EmployeeResponse,
            CreateLeaveType,
            LeaveType,
            CreateLeaveDetail,
            LeaveDetail,
            UpsertRemainingLeave,
            RemainingLeave,
            LeaveBalance,
            ApplyLeaveRequest,
            ApplyLeaveResponse,
            LeaveApplicationUpload,
            LeaveApplication,
            ApplicationStatus,
            ApprovalResponse,
            RejectLeave,
            LeaveSummaryRow,
            LeaveSummaryPage,
            Profile,
            ProfileUpdate
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Users", description = "Employee accounts"),
        (name = "Leave types", description = "Leave type catalogue"),
        (name = "Leave details", description = "Employee participation in leave types"),
        (name = "Remaining leaves", description = "Yearly leave balances"),
        (name = "Leave operations", description = "Direct balance debits"),
        (name = "Leave applications", description = "Leave requests and review"),
        (name = "Reports", description = "Monthly leave report"),
        (name = "Profile", description = "Employee profiles"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_core_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/leaves/apply-leave",
            "/remaining-leaves/",
            "/combined/all_leave_details",
            "/leave-applications/{id}/approve",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        for schema in ["LeaveSummaryPage", "RemainingLeave"] {
            assert!(components.schemas.contains_key(schema), "missing {schema}");
        }
    }

    #[test]
    fn test_combined_query_is_documented_as_query_params() {
        use crate::api::combined::CombinedQuery;
        use utoipa::IntoParams;
        let params = CombinedQuery::into_params(|| None);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["year", "month", "search", "limit", "offset"]);
    }
}
