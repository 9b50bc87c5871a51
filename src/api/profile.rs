use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_foreign_key_violation},
    model::profile::Profile,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const PROFILE_FIELDS: [&str; 22] = [
    "name",
    "address",
    "designation",
    "role",
    "status",
    "email",
    "manager_id",
    "profile_image",
    "gender",
    "blood_type",
    "headquarters_address",
    "office_locations",
    "phone_number",
    "social_links",
    "specializations",
    "products_services",
    "clients_partners",
    "certifications_awards",
    "tech_stack",
    "executives",
    "open_source_links",
    "events_hosted",
];

/// Full replacement of a profile. Omitted fields are stored as NULL.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProfileUpdate {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    pub address: Option<String>,
    pub designation: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub manager_id: Option<String>,
    pub profile_image: Option<String>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub headquarters_address: Option<String>,
    pub office_locations: Option<String>,
    pub phone_number: Option<String>,
    pub social_links: Option<String>,
    pub specializations: Option<String>,
    pub products_services: Option<String>,
    pub clients_partners: Option<String>,
    pub certifications_awards: Option<String>,
    pub tech_stack: Option<String>,
    pub executives: Option<String>,
    pub open_source_links: Option<String>,
    pub events_hosted: Option<String>,
}

impl ProfileUpdate {
    /// Values in `PROFILE_FIELDS` order.
    fn values(&self) -> [Option<&str>; 22] {
        [
            self.name.as_deref(),
            self.address.as_deref(),
            self.designation.as_deref(),
            self.role.as_deref(),
            self.status.as_deref(),
            self.email.as_deref(),
            self.manager_id.as_deref(),
            self.profile_image.as_deref(),
            self.gender.as_deref(),
            self.blood_type.as_deref(),
            self.headquarters_address.as_deref(),
            self.office_locations.as_deref(),
            self.phone_number.as_deref(),
            self.social_links.as_deref(),
            self.specializations.as_deref(),
            self.products_services.as_deref(),
            self.clients_partners.as_deref(),
            self.certifications_awards.as_deref(),
            self.tech_stack.as_deref(),
            self.executives.as_deref(),
            self.open_source_links.as_deref(),
            self.events_hosted.as_deref(),
        ]
    }
}

fn upsert_sql() -> String {
    let columns = PROFILE_FIELDS.join(", ");
    let placeholders = vec!["?"; PROFILE_FIELDS.len()].join(", ");
    let updates = PROFILE_FIELDS
        .iter()
        .map(|f| format!("{f} = VALUES({f})"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO profiles (employee_id, {columns}) VALUES (?, {placeholders}) \
         ON DUPLICATE KEY UPDATE {updates}"
    )
}

async fn fetch_profile(pool: &MySqlPool, employee_id: &str) -> Result<Option<Profile>, sqlx::Error> {
    let sql = format!(
        "SELECT employee_id, {} FROM profiles WHERE employee_id = ?",
        PROFILE_FIELDS.join(", ")
    );
    sqlx::query_as::<_, Profile>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

/// Fetch an employee's profile
#[utoipa::path(
    get,
    path = "/profile/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No profile for this employee")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn get_profile(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();

    match fetch_profile(pool.get_ref(), &employee_id).await? {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Err(AppError::NotFound(format!(
            "Profile for {employee_id} not found"
        ))),
    }
}

/// Create or replace an employee's profile
#[utoipa::path(
    post,
    path = "/profile/update/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee ID")
    ),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Stored profile", body = Profile),
        (status = 403, description = "Only the employee or HR may edit"),
        (status = 404, description = "Unknown employee")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(&employee_id)?;

    let sql = upsert_sql();
    let mut query = sqlx::query(&sql).bind(&employee_id);
    for value in payload.values() {
        query = query.bind(value);
    }

    query.execute(pool.get_ref()).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            AppError::NotFound(format!("Employee {employee_id} not found"))
        } else {
            e.into()
        }
    })?;

    tracing::info!(employee_id = %employee_id, by = %auth.employee_id, "Profile stored");

    let profile = fetch_profile(pool.get_ref(), &employee_id)
        .await?
        .ok_or_else(|| AppError::Internal("profile missing after upsert".into()))?;
    Ok(HttpResponse::Ok().json(profile))
}
