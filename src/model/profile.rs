use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Profile {
    #[schema(example = "E1")]
    pub employee_id: String,
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
